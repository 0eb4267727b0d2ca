//! Pipeline orchestration.
//!
//! Takes every source in `<root>/input/` through the same ordered stages and
//! reconciles the output folder afterwards.
//!
//! ## Stages
//!
//! ```text
//! Plan → Copy → Resize? → Convert? → Compress → Reduce* → Thumbnail → Done
//! ```
//!
//! A job whose output and thumbnail both already exist is `UpToDate` and
//! touches nothing, which makes a second run over the same folders a no-op.
//!
//! ## Output Structure
//!
//! ```text
//! <root>/
//! ├── input/
//! │   ├── a.png
//! │   └── b.jpg
//! └── output/
//!     ├── a.webp
//!     ├── b.webp
//!     └── thumbnails/
//!         ├── thumbnail_a.webp
//!         └── thumbnail_b.webp
//! ```
//!
//! ## Failure isolation
//!
//! Any error after planning is recorded on the job as
//! [`JobStatus::Failed`] with the stage it happened in; the run carries on.
//! A failed job's working file is removed so the end-of-run
//! [`FailureReport`] lists it as missing.
//!
//! ## Parallel Processing
//!
//! Jobs run in parallel using [rayon](https://docs.rs/rayon). Every job owns
//! distinct file names (collisions are resolved during planning), so the
//! existence checks that gate a job's writes only race with that job.

use crate::config::{ConfigError, OptimizerConfig};
use crate::imaging::{
    Attempt, CompressionLevel, ImageBackend, OutputFormat, Quality, ReductionPolicy,
    ResizeOutcome, RustBackend, ThumbnailConfig, compress, convert_format, create_thumbnail,
    reduce_quality, resize_to_max,
};
use crate::naming::JobId;
use crate::reconcile::{
    CopyOutcome, FailureReport, THUMBNAILS_DIR, copy_if_absent, list_source_images,
};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Input directory {} did not exist and was created; add images and run again", .0.display())]
    InputCreated(PathBuf),
    #[error("Input directory {} contains no images", .0.display())]
    InputEmpty(PathBuf),
    #[error("Reconciliation failed: {0}")]
    Reconcile(#[source] std::io::Error),
}

/// Directory layout of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub input: PathBuf,
    pub output: PathBuf,
    pub thumbnails: PathBuf,
}

impl Layout {
    pub fn from_root(root: &Path) -> Self {
        let output = root.join("output");
        Self {
            input: root.join("input"),
            thumbnails: output.join(THUMBNAILS_DIR),
            output,
        }
    }

    /// Check the input preconditions and create the output directories.
    ///
    /// A missing input directory is created and reported as an error, so the
    /// user has somewhere to drop images. Returns the sorted source names.
    pub fn prepare(&self) -> Result<Vec<String>, ProcessError> {
        if !self.input.is_dir() {
            std::fs::create_dir_all(&self.input)?;
            return Err(ProcessError::InputCreated(self.input.clone()));
        }
        let sources = list_source_images(&self.input)?;
        if sources.is_empty() {
            return Err(ProcessError::InputEmpty(self.input.clone()));
        }
        std::fs::create_dir_all(&self.thumbnails)?;
        Ok(sources)
    }
}

/// Configuration for image processing
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    pub max_dimension: u32,
    pub format: OutputFormat,
    pub compression: CompressionLevel,
    pub reduction: ReductionPolicy,
    pub thumbnail: ThumbnailConfig,
    pub thumbnail_prefix: String,
}

impl ProcessConfig {
    pub fn from_config(config: &OptimizerConfig) -> Self {
        let format = config.images.format;
        let t = &config.thumbnails;
        Self {
            max_dimension: config.images.max_dimension,
            format,
            compression: CompressionLevel::new(config.compression.level),
            reduction: ReductionPolicy {
                budget_kib: config.reduction.budget_kib,
                start_quality: config.reduction.start_quality,
                step: config.reduction.step,
                floor: config.reduction.floor,
            },
            thumbnail: ThumbnailConfig {
                max_width: t.max_size,
                max_height: t.max_size,
                quality: Quality::new(t.quality),
                reducing_gap: t.reducing_gap,
                format,
            },
            thumbnail_prefix: t.prefix.clone(),
        }
    }
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self::from_config(&OptimizerConfig::default())
    }
}

/// Where in the pipeline a job was when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Plan,
    Copy,
    Resize,
    Convert,
    Compress,
    Reduce,
    Thumbnail,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Plan => "plan",
            Stage::Copy => "copy",
            Stage::Resize => "resize",
            Stage::Convert => "convert",
            Stage::Compress => "compress",
            Stage::Reduce => "reduce",
            Stage::Thumbnail => "thumbnail",
        })
    }
}

/// What a completed stage did, in the order the stages ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Copy(CopyOutcome),
    Resize(ResizeOutcome),
    Convert { name: String, size_kib: u64 },
    Compress { size_kib: u64 },
    Quality(Attempt),
    Thumbnail { width: u32, height: u32 },
    /// The thumbnail was already on disk and was kept.
    ThumbnailPresent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Done(Vec<StageOutcome>),
    /// Output and thumbnail already existed; nothing was touched.
    UpToDate,
    Failed { stage: Stage, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub id: JobId,
    pub status: JobStatus,
}

/// Progress events sent while processing, for live CLI output.
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    RunStarted {
        total: usize,
    },
    /// `position` counts finished jobs, so it follows completion order.
    JobFinished {
        position: usize,
        total: usize,
        report: JobReport,
    },
}

#[derive(Debug, Clone)]
pub struct ProcessResult {
    /// One report per source, sorted by source name.
    pub jobs: Vec<JobReport>,
    pub report: FailureReport,
}

impl ProcessResult {
    fn count(&self, pred: impl Fn(&JobStatus) -> bool) -> usize {
        self.jobs.iter().filter(|j| pred(&j.status)).count()
    }

    pub fn done(&self) -> usize {
        self.count(|s| matches!(s, JobStatus::Done(_)))
    }

    pub fn up_to_date(&self) -> usize {
        self.count(|s| matches!(s, JobStatus::UpToDate))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, JobStatus::Failed { .. }))
    }
}

/// Load the config for a run rooted at `root` and derive its layout.
pub fn load_run(root: &Path) -> Result<(Layout, OptimizerConfig), ProcessError> {
    let config = crate::config::load_config(root)?;
    Ok((Layout::from_root(root), config))
}

pub fn process(
    layout: &Layout,
    config: &ProcessConfig,
    events: Option<Sender<ProcessEvent>>,
) -> Result<ProcessResult, ProcessError> {
    let backend = RustBackend::new();
    process_with_backend(&backend, layout, config, events)
}

/// Process images using a specific backend (allows testing with mock).
pub fn process_with_backend(
    backend: &impl ImageBackend,
    layout: &Layout,
    config: &ProcessConfig,
    events: Option<Sender<ProcessEvent>>,
) -> Result<ProcessResult, ProcessError> {
    let sources = layout.prepare()?;
    let total = sources.len();
    info!(total, input = %layout.input.display(), "starting run");
    send(&events, ProcessEvent::RunStarted { total });

    let (jobs, rejected) = plan_jobs(&sources, config.format);
    // Held across the send so positions arrive in order
    let completed = Mutex::new(0usize);
    let finish = |report: JobReport| {
        let mut count = completed.lock().unwrap_or_else(PoisonError::into_inner);
        *count += 1;
        let position = *count;
        send(
            &events,
            ProcessEvent::JobFinished {
                position,
                total,
                report: report.clone(),
            },
        );
        report
    };

    let mut reports: Vec<JobReport> = rejected.into_iter().map(&finish).collect();
    reports.par_extend(jobs.into_par_iter().map(|id| {
        let status = run_job(backend, layout, config, &id);
        finish(JobReport { id, status })
    }));
    reports.sort_by(|a, b| a.id.source_name.cmp(&b.id.source_name));

    // Every job is terminal here; only now is the output listing meaningful.
    let report = FailureReport::compute(&layout.input, &layout.output, config.format)
        .map_err(ProcessError::Reconcile)?;
    info!(missing = report.missing.len(), "run finished");

    Ok(ProcessResult {
        jobs: reports,
        report,
    })
}

fn send(events: &Option<Sender<ProcessEvent>>, event: ProcessEvent) {
    if let Some(tx) = events {
        // A dropped receiver only means nobody is watching
        tx.send(event).ok();
    }
}

/// Assign output names. When several sources map to the same output, the
/// first in sorted order owns it and the rest are rejected.
fn plan_jobs(sources: &[String], format: OutputFormat) -> (Vec<JobId>, Vec<JobReport>) {
    let mut owners: HashMap<String, String> = HashMap::new();
    let mut jobs = Vec::new();
    let mut rejected = Vec::new();

    for name in sources {
        let id = JobId::new(name, format);
        if let Some(owner) = owners.get(&id.output_name) {
            warn!(source = %name, owner = %owner, output = %id.output_name, "output name collision");
            let error = format!("{} is already produced from {owner}", id.output_name);
            rejected.push(JobReport {
                id,
                status: JobStatus::Failed {
                    stage: Stage::Plan,
                    error,
                },
            });
        } else {
            owners.insert(id.output_name.clone(), name.clone());
            jobs.push(id);
        }
    }

    (jobs, rejected)
}

struct StageFailure {
    stage: Stage,
    error: String,
}

fn at<E: fmt::Display>(stage: Stage) -> impl FnOnce(E) -> StageFailure {
    move |e| StageFailure {
        stage,
        error: e.to_string(),
    }
}

/// Mutable state of one job while it runs.
#[derive(Default)]
struct JobState {
    outcomes: Vec<StageOutcome>,
    /// The job's file in the output directory, once it exists.
    current: Option<PathBuf>,
}

fn run_job(
    backend: &impl ImageBackend,
    layout: &Layout,
    config: &ProcessConfig,
    id: &JobId,
) -> JobStatus {
    let output = layout.output.join(&id.output_name);
    let thumbnail = layout
        .thumbnails
        .join(id.thumbnail_name(&config.thumbnail_prefix));

    if output.is_file() && thumbnail.is_file() {
        debug!(source = %id.source_name, "output and thumbnail present, skipping");
        return JobStatus::UpToDate;
    }

    let mut state = JobState::default();
    match execute(backend, layout, config, id, &thumbnail, &mut state) {
        Ok(()) => JobStatus::Done(state.outcomes),
        Err(StageFailure { stage, error }) => {
            warn!(source = %id.source_name, %stage, %error, "job failed");
            if let Some(path) = state.current {
                let _ = std::fs::remove_file(path);
            }
            JobStatus::Failed { stage, error }
        }
    }
}

fn execute(
    backend: &impl ImageBackend,
    layout: &Layout,
    config: &ProcessConfig,
    id: &JobId,
    thumbnail: &Path,
    state: &mut JobState,
) -> Result<(), StageFailure> {
    let working = layout.output.join(&id.source_name);
    let copied = copy_if_absent(&layout.input.join(&id.source_name), &working)
        .map_err(at(Stage::Copy))?;
    state.current = Some(working.clone());
    state.outcomes.push(StageOutcome::Copy(copied));

    let resized = resize_to_max(backend, &working, config.max_dimension).map_err(at(Stage::Resize))?;
    state.outcomes.push(StageOutcome::Resize(resized));

    let path = if id.needs_conversion() {
        let converted = convert_format(backend, &working, config.format).map_err(at(Stage::Convert))?;
        state.current = Some(converted.path.clone());
        state.outcomes.push(StageOutcome::Convert {
            name: converted.name,
            size_kib: converted.size_kib,
        });
        converted.path
    } else {
        working
    };

    let size_kib =
        compress(backend, &path, config.format, config.compression).map_err(at(Stage::Compress))?;
    state.outcomes.push(StageOutcome::Compress { size_kib });

    let reduction = reduce_quality(backend, &path, config.format, &config.reduction, size_kib)
        .map_err(at(Stage::Reduce))?;
    state
        .outcomes
        .extend(reduction.attempts.into_iter().map(StageOutcome::Quality));

    if thumbnail.is_file() {
        debug!(source = %id.source_name, "thumbnail present, keeping it");
        state.outcomes.push(StageOutcome::ThumbnailPresent);
    } else {
        let (width, height) =
            create_thumbnail(backend, &path, thumbnail, &config.thumbnail).map_err(at(Stage::Thumbnail))?;
        state.outcomes.push(StageOutcome::Thumbnail { width, height });
    }

    Ok(())
}
