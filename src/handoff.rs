//! Fire-and-forget hand-off to an external command after a project run.
//!
//! The command comes from `[handoff] command` in the project's config, with
//! the output directory appended as its last argument. It is detached from
//! our stdio and never waited on; its exit status is not observed.

use std::path::Path;
use std::process::{Child, Command, Stdio};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum HandoffError {
    #[error("Failed to launch hand-off command {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Launch `command` on `output_dir`. Returns `None` when no command is set.
///
/// The returned [`Child`] may be dropped; the process keeps running.
pub fn spawn_handoff(command: &[String], output_dir: &Path) -> Result<Option<Child>, HandoffError> {
    let Some((program, args)) = command.split_first() else {
        return Ok(None);
    };

    let child = Command::new(program)
        .args(args)
        .arg(output_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| HandoffError::Spawn {
            program: program.clone(),
            source,
        })?;

    info!(program = %program, pid = child.id(), "hand-off launched");
    Ok(Some(child))
}
