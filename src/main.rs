use clap::{Parser, Subcommand};
use imgprep::config::{self, OptimizerConfig};
use imgprep::process::{self, Layout, ProcessConfig, ProcessResult};
use imgprep::reconcile::FailureReport;
use imgprep::{handoff, output};
use std::error::Error;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "imgprep")]
#[command(about = "Batch image preparation: resize, convert, shrink, thumbnail")]
#[command(long_about = "\
Batch image preparation: resize, convert, shrink, thumbnail

Every image in input/ gets an optimized copy in output/ (longest side at
most 1500px, converted to WebP, squeezed under 200 KiB where quality allows)
and a preview in output/thumbnails/ (at most 800px).

Folder structure:

  <root>/
  ├── config.toml            # Optional, see 'imgprep gen-config'
  ├── input/                 # Sources (created on first run if missing)
  │   ├── a.png
  │   └── b.jpg
  ├── output/
  │   ├── a.webp
  │   ├── b.webp
  │   └── thumbnails/
  │       ├── thumbnail_a.webp
  │       └── thumbnail_b.webp
  └── <project>/             # Named projects: same layout, own config
      ├── config.toml
      ├── input/
      └── output/

Runs are idempotent: images whose output and thumbnail both exist are
skipped. Sources that end up without an output are listed at the end.")]
#[command(version)]
struct Cli {
    /// Directory holding input/ and output/ (or the project directories)
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Show debug diagnostics on stderr (overrides RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process <root>/input into <root>/output
    Run,
    /// Process <root>/<NAME>/input, then launch the configured hand-off command
    Project {
        /// Project directory name under the root
        name: String,
    },
    /// List sources with no matching output, without processing anything
    Check {
        /// Check a named project instead of the root
        #[arg(long)]
        project: Option<String>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    match cli.command {
        Command::Run => {
            println!("==> Processing {}", cli.root.display());
            run_pipeline(&cli.root)?;
        }
        Command::Project { name } => {
            let root = cli.root.join(&name);
            println!("==> Processing project {} ({})", name, root.display());
            let (config, layout, _) = run_pipeline(&root)?;
            if handoff::spawn_handoff(&config.handoff.command, &layout.output)?.is_some() {
                println!("==> Hand-off: {}", config.handoff.command.join(" "));
            }
        }
        Command::Check { project, json } => {
            let root = match project {
                Some(name) => cli.root.join(name),
                None => cli.root.clone(),
            };
            let (layout, config) = process::load_run(&root)?;
            if !layout.input.is_dir() {
                return Err(format!("Input directory {} does not exist", layout.input.display()).into());
            }
            let report = FailureReport::compute(&layout.input, &layout.output, config.images.format)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                output::print_missing(&report);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load config, process with live progress output, print the summary.
fn run_pipeline(
    root: &Path,
) -> Result<(OptimizerConfig, Layout, ProcessResult), Box<dyn Error>> {
    let (layout, config) = process::load_run(root)?;
    init_thread_pool(&config.processing);

    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_process_event(&event) {
                println!("{}", line);
            }
        }
    });
    let result = process::process(&layout, &ProcessConfig::from_config(&config), Some(tx));
    printer
        .join()
        .map_err(|_| "progress printer thread panicked")?;

    let result = result?;
    output::print_summary(&result);
    Ok((config, layout, result))
}

/// Diagnostics go to stderr so they never interleave with `check --json`.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
