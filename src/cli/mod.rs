//! Command-line interface for the alignment pipeline.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::processors::pipeline::{AlignReport, ApplyReport};
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "ili-align")]
#[command(about = "ILI survey weld alignment and drift correction pipeline", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Match welds across surveys, fit the drift model and write the merged table
    Align {
        /// Per-survey weld CSV files (2 fitted, optional 3rd attached)
        #[arg(num_args = 2..=3, required = true)]
        surveys: Vec<PathBuf>,
        /// Output CSV path for the merged table
        #[arg(short, long, default_value = "merged_by_distance.csv")]
        output: PathBuf,
        /// Matching tolerance in distance units
        #[arg(long)]
        tolerance: Option<f64>,
    },

    /// Re-apply the drift correction to a merged table and finalize it
    Apply {
        /// Merged table produced by the align stage
        #[arg(default_value = "merged_by_distance.csv")]
        input: PathBuf,
        /// Output CSV path for the corrected records
        #[arg(short, long, default_value = "welds_corrected.csv")]
        output: PathBuf,
        /// Keep the align-stage correction instead of compounding
        #[arg(long)]
        no_compound: bool,
    },

    /// Plot the drift function of a merged table as a PNG
    Plot {
        /// Merged table produced by the align stage
        #[arg(default_value = "merged_by_distance.csv")]
        input: PathBuf,
        /// Output PNG path (defaults to the input name with .png extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run align, apply and plot in sequence
    Run {
        /// Per-survey weld CSV files (2 fitted, optional 3rd attached)
        #[arg(num_args = 2..=3, required = true)]
        surveys: Vec<PathBuf>,
        /// Output directory for the pipeline artifacts
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
        /// Matching tolerance in distance units
        #[arg(long)]
        tolerance: Option<f64>,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.len() > 39 {
            format!("{}...", &value[..36])
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}, using defaults",
                    path.display(),
                    e
                );
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    };

    // Dispatch to subcommands
    match cli.command {
        Commands::Align {
            surveys,
            output,
            tolerance,
        } => {
            cmd_align(&surveys, &output, tolerance, &config);
        }
        Commands::Apply {
            input,
            output,
            no_compound,
        } => {
            cmd_apply(&input, &output, no_compound, &config);
        }
        Commands::Plot { input, output } => {
            cmd_plot(&input, output);
        }
        Commands::Run {
            surveys,
            output_dir,
            tolerance,
        } => {
            cmd_run(&surveys, &output_dir, tolerance, &config);
        }
    }
}

/// Apply CLI overrides on top of the loaded config.
fn effective_config(config: &PipelineConfig, tolerance: Option<f64>, no_compound: bool) -> PipelineConfig {
    let mut config = config.clone();
    if let Some(t) = tolerance {
        config.matching.tolerance = t;
    }
    if no_compound {
        config.correction.compound = false;
    }
    config
}

fn align_summary_items(report: &AlignReport, elapsed: std::time::Duration) -> Vec<(&'static str, String)> {
    let mut items: Vec<(&'static str, String)> = vec![
        ("Surveys", report.surveys.len().to_string()),
        (
            "Rows read",
            report.surveys.iter().map(|s| s.rows_in).sum::<usize>().to_string(),
        ),
        ("Matched welds", report.matched_rows.to_string()),
        ("Unmatched welds", report.unmatched_primary.to_string()),
    ];
    if let Some(attached) = report.tertiary_attached {
        items.push(("3rd survey matches", attached.to_string()));
    }
    items.push((
        "Drift range",
        format!("[{:.3}, {:.3}]", report.drift.delta_min, report.drift.delta_max),
    ));
    items.push(("Drift mean", format!("{:.3}", report.drift.delta_mean)));
    items.push(("Output", report.output.display().to_string()));
    items.push(("Duration", format!("{:.2?}", elapsed)));
    items
}

fn apply_summary_items(report: &ApplyReport, elapsed: std::time::Duration) -> Vec<(&'static str, String)> {
    vec![
        ("Rows written", report.rows.to_string()),
        ("Pairs in model", report.pairs_used.to_string()),
        ("Compound", report.compound.to_string()),
        (
            "Drift range",
            format!("[{:.3}, {:.3}]", report.drift.delta_min, report.drift.delta_max),
        ),
        ("Output", report.output.display().to_string()),
        ("Duration", format!("{:.2?}", elapsed)),
    ]
}

fn cmd_align(surveys: &[PathBuf], output: &Path, tolerance: Option<f64>, config: &PipelineConfig) {
    use crate::processors::pipeline;

    let start = Instant::now();
    let config = effective_config(config, tolerance, false);

    println!("Aligning surveys by weld distance...");
    for path in surveys {
        println!("  {}", path.display());
    }
    println!("Tolerance: {}", config.matching.tolerance);

    let spinner = create_spinner("Matching welds and fitting drift model...");

    match pipeline::align_files(surveys, output, &config) {
        Ok(report) => {
            spinner.finish_and_clear();
            print_summary("Alignment Complete", &align_summary_items(&report, start.elapsed()));
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Alignment failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_apply(input: &Path, output: &Path, no_compound: bool, config: &PipelineConfig) {
    use crate::processors::pipeline;

    let start = Instant::now();
    let config = effective_config(config, None, no_compound);

    println!("Applying drift correction...");
    println!("Input: {}", input.display());
    println!("Output: {}", output.display());

    let spinner = create_spinner("Rebuilding drift model and correcting distances...");

    match pipeline::apply_files(input, output, &config) {
        Ok(report) => {
            spinner.finish_and_clear();
            print_summary("Correction Complete", &apply_summary_items(&report, start.elapsed()));
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Correction failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_plot(input: &Path, output: Option<PathBuf>) {
    use crate::core::loaders;
    use crate::processors::pipeline;
    use crate::visualization;

    let start = Instant::now();

    // Default to the input name with a .png extension
    let output_path = output.unwrap_or_else(|| {
        let mut path = input.to_path_buf();
        path.set_extension("png");
        path
    });

    println!("Plotting drift function...");
    println!("Input: {}", input.display());
    println!("Output: {}", output_path.display());

    let spinner = create_spinner("Rebuilding drift model...");

    let table = match loaders::load_table_csv(input) {
        Ok(t) => t,
        Err(e) => {
            spinner.finish_and_clear();
            error!("Failed to load merged table: {}", e);
            std::process::exit(1);
        }
    };

    let (model, primary_col, secondary_col, pairs) = match pipeline::drift_from_merged(&table) {
        Ok(parts) => parts,
        Err(e) => {
            spinner.finish_and_clear();
            error!("Failed to rebuild drift model: {:#}", e);
            std::process::exit(1);
        }
    };

    spinner.set_message("Rendering plot...");

    match visualization::plot_drift_function(&output_path, &model) {
        Ok(()) => {
            spinner.finish_and_clear();
            let summary = model.summary();

            print_summary(
                "Drift Plot Complete",
                &[
                    ("Input file", input.display().to_string()),
                    ("Output PNG", output_path.display().to_string()),
                    ("Fitted pair", format!("{} vs {}", primary_col, secondary_col)),
                    ("Anchors", pairs.to_string()),
                    (
                        "Drift range",
                        format!("[{:.3}, {:.3}]", summary.delta_min, summary.delta_max),
                    ),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Plotting failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_run(surveys: &[PathBuf], output_dir: &Path, tolerance: Option<f64>, config: &PipelineConfig) {
    use crate::processors::pipeline;
    use crate::visualization;

    let start = Instant::now();
    let config = effective_config(config, tolerance, false);

    let merged_path = output_dir.join("merged_by_distance.csv");
    let corrected_path = output_dir.join("welds_corrected.csv");
    let plot_path = output_dir.join("drift_function.png");

    println!("Running full alignment pipeline...");
    for path in surveys {
        println!("  {}", path.display());
    }
    println!("Output directory: {}", output_dir.display());

    let spinner = create_spinner("Stage 1/3: aligning surveys...");

    let align_report = match pipeline::align_files(surveys, &merged_path, &config) {
        Ok(report) => report,
        Err(e) => {
            spinner.finish_and_clear();
            error!("Alignment failed: {:#}", e);
            std::process::exit(1);
        }
    };

    spinner.set_message("Stage 2/3: applying correction...");

    let apply_report = match pipeline::apply_files(&merged_path, &corrected_path, &config) {
        Ok(report) => report,
        Err(e) => {
            spinner.finish_and_clear();
            error!("Correction failed: {:#}", e);
            std::process::exit(1);
        }
    };

    spinner.set_message("Stage 3/3: plotting drift function...");

    let merged = match crate::core::loaders::load_table_csv(&merged_path) {
        Ok(t) => t,
        Err(e) => {
            spinner.finish_and_clear();
            error!("Failed to reload merged table: {}", e);
            std::process::exit(1);
        }
    };

    let plot_result = pipeline::drift_from_merged(&merged)
        .map_err(|e| e.to_string())
        .and_then(|(model, _, _, _)| {
            visualization::plot_drift_function(&plot_path, &model).map_err(|e| e.to_string())
        });

    spinner.finish_and_clear();

    if let Err(e) = plot_result {
        // The data artifacts are already on disk; a plot failure is not fatal.
        warn!("Drift plot failed: {}", e);
    }

    print_summary(
        "Pipeline Complete",
        &[
            ("Surveys", align_report.surveys.len().to_string()),
            ("Matched welds", align_report.matched_rows.to_string()),
            ("Rows written", apply_report.rows.to_string()),
            ("Compound", apply_report.compound.to_string()),
            (
                "Drift range",
                format!(
                    "[{:.3}, {:.3}]",
                    apply_report.drift.delta_min, apply_report.drift.delta_max
                ),
            ),
            ("Merged table", merged_path.display().to_string()),
            ("Corrected table", corrected_path.display().to_string()),
            ("Drift plot", plot_path.display().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}
