//! # imgprep
//!
//! Batch image preparation for the web. Point it at a folder of photos and it
//! produces optimized copies (bounded dimensions, converted format, bounded
//! file size) plus thumbnails, then reports every source that ended up
//! without an output.
//!
//! # Pipeline
//!
//! Every source image goes through the same ordered stages:
//!
//! ```text
//! input/a.png ──copy──▶ output/a.png ──resize──▶ (≤1500px)
//!             ──convert──▶ output/a.webp ──compress──▶ ──reduce quality──▶ (≤200 KiB)
//!             ──thumbnail──▶ output/thumbnails/thumbnail_a.webp (≤800px)
//! ```
//!
//! After every job has finished, the input and output folders are diffed and
//! the expected-but-absent outputs are listed.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`process`] | Orchestrator: plans jobs, runs them in parallel, isolates failures |
//! | [`imaging`] | Codec seam, dimension math, the quality-reduction loop |
//! | [`naming`] | `JobId`: source name to output and thumbnail names |
//! | [`reconcile`] | Source listing, copy-if-absent, missing-output diff |
//! | [`config`] | `config.toml` loading, merging over stock defaults, validation |
//! | [`handoff`] | Fire-and-forget external command after a project run |
//! | [`output`] | CLI output formatting for progress and summaries |
//!
//! # Design Decisions
//!
//! ## Idempotent by Filesystem
//!
//! There is no manifest or cache file. Whether a job still needs work is
//! decided by whether its output and thumbnail exist, so a run can be
//! interrupted and restarted at any point, and a second run over the same
//! folders changes nothing.
//!
//! ## Sizes Are Always Measured
//!
//! Every stage that writes a file re-reads its size from disk. Sizes are
//! whole KiB rounded up, so "within 200 KiB" means at most 204,800 bytes.
//!
//! ## Failures Are Data
//!
//! A corrupt or unsupported image fails its own job with the stage it failed
//! in; it never aborts the run. Only missing or empty input folders and
//! invalid configuration are fatal.

pub mod config;
pub mod handoff;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod process;
pub mod reconcile;

#[cfg(test)]
pub(crate) mod test_helpers;
