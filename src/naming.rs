//! Job identity: the mapping from a source filename to the output names it
//! produces.
//!
//! A [`JobId`] is computed once per source and threaded through every stage,
//! so the orchestrator and the reconciler can never disagree about what a
//! source's output is called.
//!
//! ## Naming rules
//!
//! - The stem is everything before the **last** dot: `trip.day1.png` → `trip.day1`.
//! - A source already in the target format keeps its own name, including
//!   the extension's case: `IMG_01.WEBP` stays `IMG_01.WEBP`.
//! - Anything else becomes `<stem>.<target extension>`: `a.png` → `a.webp`.
//! - A name without an extension gains one: `scan` → `scan.webp`.
//! - Thumbnails are `<prefix><output name>`: `thumbnail_a.webp`.

use crate::imaging::OutputFormat;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId {
    /// Filename as found in the input directory.
    pub source_name: String,
    pub stem: String,
    /// Filename the optimized image ends up with in the output directory.
    pub output_name: String,
}

impl JobId {
    pub fn new(source_name: &str, format: OutputFormat) -> Self {
        let path = Path::new(source_name);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| source_name.to_string());
        let already_target = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| format.matches_extension(e));

        let output_name = if already_target {
            source_name.to_string()
        } else {
            format!("{stem}.{}", format.extension())
        };

        Self {
            source_name: source_name.to_string(),
            stem,
            output_name,
        }
    }

    /// Whether the working copy must be re-encoded into the target format.
    pub fn needs_conversion(&self) -> bool {
        self.source_name != self.output_name
    }

    pub fn thumbnail_name(&self, prefix: &str) -> String {
        format!("{prefix}{}", self.output_name)
    }
}
