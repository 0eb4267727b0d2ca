//! Folder reconciliation: the filesystem side of idempotence.
//!
//! Three questions are answered here, all by listing directories and never by
//! decoding images:
//!
//! 1. Which files in the input directory are sources? ([`list_source_images`])
//! 2. Does a job's working copy still need to be made? ([`copy_if_absent`])
//! 3. Which expected outputs are absent after a run? ([`find_missing_outputs`])
//!
//! Sources are regular files whose names do not start with a dot. A
//! `thumbnails` entry is never a source, whether it is a directory or a file.

use crate::imaging::{OutputFormat, bytes_to_kib};
use crate::naming::JobId;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;

/// Name of the thumbnail directory inside the output directory.
pub const THUMBNAILS_DIR: &str = "thumbnails";

/// Source filenames in `dir`, sorted.
pub fn list_source_images(dir: &Path) -> io::Result<Vec<String>> {
    let mut names: Vec<String> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| !name.starts_with('.') && name != THUMBNAILS_DIR)
        .collect();

    names.sort();
    Ok(names)
}

/// Every entry name in `dir`, files and directories alike.
pub fn list_names(dir: &Path) -> io::Result<BTreeSet<String>> {
    Ok(fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    /// `dst` was absent and now holds a copy of `src`.
    Copied(u64),
    /// `dst` already existed and was left alone.
    Present(u64),
}

/// Copy `src` to `dst` unless `dst` exists. Either way, report `dst`'s size.
pub fn copy_if_absent(src: &Path, dst: &Path) -> io::Result<CopyOutcome> {
    if dst.exists() {
        return Ok(CopyOutcome::Present(bytes_to_kib(fs::metadata(dst)?.len())));
    }
    let bytes = fs::copy(src, dst)?;
    Ok(CopyOutcome::Copied(bytes_to_kib(bytes)))
}

/// Expected output names with no counterpart in `output_dir`.
///
/// An output directory that does not exist yet counts as empty.
pub fn find_missing_outputs(
    source_dir: &Path,
    output_dir: &Path,
    format: OutputFormat,
) -> io::Result<BTreeSet<String>> {
    let present = match list_names(output_dir) {
        Ok(names) => names,
        Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeSet::new(),
        Err(e) => return Err(e),
    };
    Ok(list_source_images(source_dir)?
        .iter()
        .map(|name| JobId::new(name, format).output_name)
        .filter(|expected| !present.contains(expected))
        .collect())
}

/// End-of-run reconciliation result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FailureReport {
    pub missing: BTreeSet<String>,
}

impl FailureReport {
    pub fn compute(source_dir: &Path, output_dir: &Path, format: OutputFormat) -> io::Result<Self> {
        Ok(Self {
            missing: find_missing_outputs(source_dir, output_dir, format)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.missing.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"data").unwrap();
    }

    #[test]
    fn list_sources_skips_dotfiles_dirs_and_thumbnails() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "b.jpg");
        touch(tmp.path(), "a.png");
        touch(tmp.path(), ".DS_Store");
        fs::create_dir(tmp.path().join("thumbnails")).unwrap();
        fs::create_dir(tmp.path().join("nested")).unwrap();

        let names = list_source_images(tmp.path()).unwrap();
        assert_eq!(names, vec!["a.png", "b.jpg"]);
    }

    #[test]
    fn list_sources_skips_thumbnails_file() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "thumbnails");
        touch(tmp.path(), "c.png");

        assert_eq!(list_source_images(tmp.path()).unwrap(), vec!["c.png"]);
    }

    #[test]
    fn copy_when_absent() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src.png");
        let dst = tmp.path().join("dst.png");
        fs::write(&src, vec![1u8; 1500]).unwrap();

        let outcome = copy_if_absent(&src, &dst).unwrap();
        assert_eq!(outcome, CopyOutcome::Copied(2));
        assert_eq!(fs::read(&dst).unwrap().len(), 1500);
    }

    #[test]
    fn copy_leaves_existing_destination() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src.png");
        let dst = tmp.path().join("dst.png");
        fs::write(&src, vec![1u8; 5000]).unwrap();
        fs::write(&dst, b"already processed").unwrap();

        let outcome = copy_if_absent(&src, &dst).unwrap();
        assert_eq!(outcome, CopyOutcome::Present(1));
        assert_eq!(fs::read(&dst).unwrap(), b"already processed");
    }

    #[test]
    fn missing_outputs_diff() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("input");
        let output = tmp.path().join("output");
        fs::create_dir_all(&input).unwrap();
        fs::create_dir_all(output.join("thumbnails")).unwrap();
        touch(&input, "a.png");
        touch(&input, "b.jpg");
        touch(&output, "a.webp");

        let missing = find_missing_outputs(&input, &output, OutputFormat::Webp).unwrap();
        assert_eq!(missing, BTreeSet::from(["b.webp".to_string()]));
    }

    #[test]
    fn missing_output_dir_reports_everything() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "a.png");
        touch(tmp.path(), "b.webp");

        let missing =
            find_missing_outputs(tmp.path(), &tmp.path().join("nope"), OutputFormat::Webp).unwrap();
        assert_eq!(
            missing,
            BTreeSet::from(["a.webp".to_string(), "b.webp".to_string()])
        );
    }

    #[test]
    fn thumbnails_in_input_never_reported() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("input");
        let output = tmp.path().join("output");
        fs::create_dir_all(input.join("thumbnails")).unwrap();
        fs::create_dir_all(&output).unwrap();
        touch(&input, "a.png");

        let report = FailureReport::compute(&input, &output, OutputFormat::Webp).unwrap();
        assert_eq!(report.missing, BTreeSet::from(["a.webp".to_string()]));
        assert!(!report.missing.iter().any(|n| n.contains("thumbnails")));
    }

    #[test]
    fn complete_output_reports_nothing() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("input");
        let output = tmp.path().join("output");
        fs::create_dir_all(&input).unwrap();
        fs::create_dir_all(&output).unwrap();
        touch(&input, "x.webp");
        touch(&output, "x.webp");

        let report = FailureReport::compute(&input, &output, OutputFormat::Webp).unwrap();
        assert!(report.is_empty());
    }

    #[test]
    fn report_serializes_as_sorted_list() {
        let report = FailureReport {
            missing: BTreeSet::from(["b.webp".to_string(), "a.webp".to_string()]),
        };
        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(json, r#"{"missing":["a.webp","b.webp"]}"#);
    }
}
