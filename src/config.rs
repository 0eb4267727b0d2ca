//! Pipeline configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! overridden by a sparse user file in the run's root directory.
//!
//! ## Config File Location
//!
//! ```text
//! photos/
//! ├── config.toml     # optional, overrides stock defaults
//! ├── input/          # sources
//! └── output/         # optimized images + thumbnails/
//! ```
//!
//! For a named project the root is `<root>/<project>/`, so every project can
//! carry its own settings.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [images]
//! max_dimension = 1500      # Longest side of optimized output, in pixels
//! format = "webp"           # webp | jpeg | png
//!
//! [compression]
//! level = 2                 # Effort of the first compression pass (0-9)
//!
//! [reduction]
//! budget_kib = 200          # Target file size ceiling
//! start_quality = 100       # First attempt is start_quality - step
//! step = 10
//! floor = 40                # Exclusive: never attempted
//!
//! [thumbnails]
//! max_size = 800            # Bounding box edge, in pixels
//! quality = 80
//! reducing_gap = 2.0        # Two-step downscale factor; 0 disables
//! prefix = "thumbnail_"
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//!
//! [handoff]
//! command = []              # Launched after a project run, output dir appended
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::OutputFormat;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Name of the config file looked up in a run's root directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Largest width or height libwebp can encode.
pub const WEBP_MAX_DIMENSION: u32 = 16383;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration loaded from `config.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptimizerConfig {
    /// Output dimension bound and target format.
    pub images: ImagesConfig,
    /// First (effort-only) encode pass.
    pub compression: CompressionConfig,
    /// Quality-reduction loop.
    pub reduction: ReductionConfig,
    /// Preview generation.
    pub thumbnails: ThumbnailsConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
    /// External command launched after a project run.
    pub handoff: HandoffConfig,
}

impl OptimizerConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.images.max_dimension == 0 {
            return Err(ConfigError::Validation(
                "images.max_dimension must be non-zero".into(),
            ));
        }
        if self.images.format == OutputFormat::Webp
            && self.images.max_dimension > WEBP_MAX_DIMENSION
        {
            return Err(ConfigError::Validation(format!(
                "images.max_dimension must be at most {WEBP_MAX_DIMENSION} for webp output"
            )));
        }
        if self.compression.level > 9 {
            return Err(ConfigError::Validation(
                "compression.level must be 0-9".into(),
            ));
        }

        let r = &self.reduction;
        if !(1..=100).contains(&r.start_quality) {
            return Err(ConfigError::Validation(
                "reduction.start_quality must be 1-100".into(),
            ));
        }
        if r.step == 0 {
            return Err(ConfigError::Validation(
                "reduction.step must be at least 1".into(),
            ));
        }
        if r.floor >= r.start_quality {
            return Err(ConfigError::Validation(
                "reduction.floor must be below reduction.start_quality".into(),
            ));
        }

        let t = &self.thumbnails;
        if t.max_size == 0 {
            return Err(ConfigError::Validation(
                "thumbnails.max_size must be non-zero".into(),
            ));
        }
        if !(1..=100).contains(&t.quality) {
            return Err(ConfigError::Validation(
                "thumbnails.quality must be 1-100".into(),
            ));
        }
        if t.reducing_gap != 0.0 && t.reducing_gap < 1.0 {
            return Err(ConfigError::Validation(
                "thumbnails.reducing_gap must be 0 or at least 1.0".into(),
            ));
        }
        if t.prefix.contains(['/', '\\']) {
            return Err(ConfigError::Validation(
                "thumbnails.prefix must not contain path separators".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Longest side of optimized output, in pixels.
    pub max_dimension: u32,
    /// Container format every output is converted to.
    pub format: OutputFormat,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            max_dimension: 1500,
            format: OutputFormat::Webp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompressionConfig {
    /// Encoder effort, 0 (fastest) to 9 (smallest).
    pub level: u32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self { level: 2 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReductionConfig {
    /// Size ceiling in KiB (inclusive).
    pub budget_kib: u64,
    pub start_quality: u32,
    pub step: u32,
    /// Exclusive lower bound on attempted quality.
    pub floor: u32,
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            budget_kib: 200,
            start_quality: 100,
            step: 10,
            floor: 40,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThumbnailsConfig {
    /// Edge of the square bounding box, in pixels.
    pub max_size: u32,
    pub quality: u32,
    /// Box-filter pre-reduction factor before the bicubic pass. `0` disables.
    pub reducing_gap: f32,
    /// Prepended to the output name to form the thumbnail name.
    pub prefix: String,
}

impl Default for ThumbnailsConfig {
    fn default() -> Self {
        Self {
            max_size: 800,
            quality: 80,
            reducing_gap: 2.0,
            prefix: "thumbnail_".to_string(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel image processing workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HandoffConfig {
    /// Program and arguments. Empty means no hand-off.
    pub command: Vec<String>,
}

/// Stock defaults as a TOML value tree, the base every user file merges onto.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(OptimizerConfig::default()).expect("default config must serialize")
}

/// Deep-merge `overlay` onto `base`. Tables merge key by key; any other
/// value in the overlay replaces the base value outright.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read `dir/config.toml` as an untyped value, if present.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<OptimizerConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: OptimizerConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load, merge and validate the config for a run rooted at `root`.
pub fn load_config(root: &Path) -> Result<OptimizerConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(root)?;
    resolve_config(base, overlay)
}

/// A documented `config.toml` with every option at its default.
pub fn stock_config_toml() -> &'static str {
    r##"# imgprep Configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Place this file next to the input/ and output/ directories:
#   photos/config.toml              -> ad hoc run on photos/
#   photos/<project>/config.toml    -> project run on photos/<project>/
#
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Optimized images
# ---------------------------------------------------------------------------
[images]
# Longest side of every optimized image, in pixels. Smaller images are
# never upscaled.
max_dimension = 1500

# Target container format: "webp", "jpeg" or "png".
format = "webp"

# ---------------------------------------------------------------------------
# Compression pass
# ---------------------------------------------------------------------------
[compression]
# Encoder effort for the first re-encode, 0 (fastest) to 9 (smallest).
# JPEG ignores this.
level = 2

# ---------------------------------------------------------------------------
# Size reduction
# ---------------------------------------------------------------------------
[reduction]
# Files above this size (KiB, rounded up) are re-encoded at lower quality.
budget_kib = 200

# The first attempt uses start_quality - step, then keeps stepping down.
start_quality = 100
step = 10

# Qualities at or below the floor are never attempted. A file still over
# budget at the last attempt is kept as-is.
floor = 40

# ---------------------------------------------------------------------------
# Thumbnails (written to output/thumbnails/)
# ---------------------------------------------------------------------------
[thumbnails]
# Neither side of a thumbnail exceeds this many pixels.
max_size = 800

# Encoding quality (1-100).
quality = 80

# Downscale in two steps: a fast box reduce to reducing_gap times the final
# size, then bicubic. Higher is slower and closer to a pure bicubic result.
# Set to 0 to always use the bicubic pass alone.
reducing_gap = 2.0

# Thumbnail filename = prefix + optimized filename.
prefix = "thumbnail_"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel image-processing workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4

# ---------------------------------------------------------------------------
# Hand-off (project runs only)
# ---------------------------------------------------------------------------
[handoff]
# Command launched in the background after a project run finishes, with the
# output directory appended as the last argument. Not waited on.
# Example: command = ["python3", "classify.py"]
command = []
"##
}
