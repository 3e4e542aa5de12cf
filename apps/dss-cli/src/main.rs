use clap::{Parser, Subcommand};
use dss_app::{
    AppResult, RunOptions, RunProgressEvent, RunRequest, RunStage, RunTimingSummary,
    circuit_summary, load_scenario, query, run_service, validate_scenario,
};
use dss_core::Reading;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dss-cli")]
#[command(about = "dsstap CLI - quasi-static time series on distribution feeders", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a scenario file and the files it redirects
    Validate {
        /// Path to the scenario YAML file
        scenario_path: PathBuf,
    },
    /// Compile the circuit, solve one step and print its totals
    Info {
        /// Path to the scenario YAML file
        scenario_path: PathBuf,
    },
    /// Run the scenario's step loop
    Run {
        /// Path to the scenario YAML file
        scenario_path: PathBuf,
        /// Skip cache and force re-run
        #[arg(long)]
        no_cache: bool,
    },
    /// List cached runs for a scenario
    Runs {
        /// Path to the scenario YAML file
        scenario_path: PathBuf,
    },
    /// Show the recorded keys of a cached run
    ShowRun {
        /// Path to the scenario YAML file
        scenario_path: PathBuf,
        /// Run ID to display
        run_id: String,
    },
    /// Export one recorded series from a run as CSV
    ExportSeries {
        /// Path to the scenario YAML file
        scenario_path: PathBuf,
        /// Run ID
        run_id: String,
        /// Recorded key (e.g. bus.671.voltage_avg_pu)
        key: String,
        /// Output CSV file path (optional, defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> AppResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { scenario_path } => cmd_validate(&scenario_path),
        Commands::Info { scenario_path } => cmd_info(&scenario_path),
        Commands::Run {
            scenario_path,
            no_cache,
        } => cmd_run(&scenario_path, !no_cache),
        Commands::Runs { scenario_path } => cmd_runs(&scenario_path),
        Commands::ShowRun {
            scenario_path,
            run_id,
        } => cmd_show_run(&scenario_path, &run_id),
        Commands::ExportSeries {
            scenario_path,
            run_id,
            key,
            output,
        } => cmd_export_series(&scenario_path, &run_id, &key, output.as_deref()),
    }
}

fn cmd_validate(scenario_path: &Path) -> AppResult<()> {
    println!("Validating scenario: {}", scenario_path.display());
    let scenario = load_scenario(scenario_path)?;
    validate_scenario(&scenario)?;
    println!(
        "✓ Scenario '{}' is valid ({} steps of {} s, {} records)",
        scenario.name,
        scenario.steps,
        scenario.time_step_s,
        scenario.record.len()
    );
    Ok(())
}

fn cmd_info(scenario_path: &Path) -> AppResult<()> {
    let scenario = load_scenario(scenario_path)?;
    validate_scenario(&scenario)?;
    let summary = circuit_summary(&scenario)?;

    println!("Circuit: {}", summary.name);
    println!("\n{}", summary.info);
    println!("\nBuses ({}):", summary.buses.len());
    for bus in &summary.buses {
        println!("  {}", bus);
    }
    if let Some((bus, reading)) = &summary.first_bus {
        println!("\nVoltage at {} (pu): {}", bus, format_reading(reading));
    }
    Ok(())
}

fn format_reading(reading: &Reading) -> String {
    match reading {
        Reading::Value(v) => format!("{v:.4}"),
        Reading::Pair(a, b) => format!("({a:.4}, {b:.4})"),
        Reading::Values(values) => values
            .iter()
            .map(|v| format!("{v:.4}"))
            .collect::<Vec<_>>()
            .join("  "),
        Reading::Pairs(pairs) => pairs
            .iter()
            .map(|(a, b)| format!("({a:.4}, {b:.4})"))
            .collect::<Vec<_>>()
            .join("  "),
    }
}

fn cmd_run(scenario_path: &Path, use_cache: bool) -> AppResult<()> {
    println!("Running scenario: {}", scenario_path.display());

    let request = RunRequest {
        scenario_path,
        options: RunOptions { use_cache },
    };

    let mut last_emit = Instant::now();
    let mut last_stage = None;
    let response = run_service::ensure_run_with_progress(
        &request,
        Some(&mut |event| {
            let emit_now = last_stage.as_ref() != Some(&event.stage)
                || last_emit.elapsed().as_millis() >= 100;
            if emit_now {
                render_cli_progress(&event);
                last_stage = Some(event.stage.clone());
                last_emit = Instant::now();
            }
        }),
    )?;
    clear_progress_line();

    if response.loaded_from_cache {
        println!("✓ Loaded from cache: {}", response.run_id);
    } else {
        println!("✓ Run completed: {}", response.run_id);
    }
    println!("  Recorded keys: {}", response.manifest.keys.len());
    print_timing_summary(&response.timing);
    Ok(())
}

fn clear_progress_line() {
    print!("\r{}\r", " ".repeat(120));
    let _ = io::stdout().flush();
}

fn render_cli_progress(event: &RunProgressEvent) {
    match (&event.stage, event.step) {
        (RunStage::Stepping, Some(step)) => {
            let width = 28usize;
            let fraction = event.fraction_complete();
            let filled = ((fraction * width as f64).round() as usize).min(width);
            let bar = format!(
                "{}{}",
                "#".repeat(filled),
                "-".repeat(width.saturating_sub(filled))
            );
            print!(
                "\r[{}] {:>6.2}%  step={}/{}  elapsed={:.1}s",
                bar,
                fraction * 100.0,
                step,
                event.total_steps,
                event.elapsed_wall_s
            );
        }
        _ => {
            let spinner = ['|', '/', '-', '\\'];
            let spin_idx = ((event.elapsed_wall_s * 10.0) as usize) % spinner.len();
            let mut line = format!(
                "\r{} {}  elapsed={:.2}s",
                spinner[spin_idx],
                event.stage.label(),
                event.elapsed_wall_s
            );
            if let Some(msg) = &event.message {
                line.push_str(&format!("  {}", msg));
            }
            print!("{}", line);
        }
    }
    let _ = io::stdout().flush();
}

fn print_timing_summary(timing: &RunTimingSummary) {
    let total = timing.total_time_s.max(1.0e-12);
    let pct = |t: f64| 100.0 * t / total;

    println!("\nTiming summary:");
    if timing.load_cache_time_s > 0.0 {
        println!("  Cache load: {:.3}s", timing.load_cache_time_s);
    } else {
        println!(
            "  Compile: {:.3}s ({:.1}%)",
            timing.compile_time_s,
            pct(timing.compile_time_s)
        );
        println!(
            "  Step:    {:.3}s ({:.1}%)",
            timing.step_time_s,
            pct(timing.step_time_s)
        );
        println!(
            "  Record:  {:.3}s ({:.1}%)",
            timing.record_time_s,
            pct(timing.record_time_s)
        );
        println!(
            "  Save:    {:.3}s ({:.1}%)",
            timing.save_time_s,
            pct(timing.save_time_s)
        );
    }
    println!("  Total:   {:.3}s", timing.total_time_s);
    println!("  Steps:   {}", timing.steps);
}

fn cmd_runs(scenario_path: &Path) -> AppResult<()> {
    let runs = run_service::list_runs(scenario_path)?;

    if runs.is_empty() {
        println!("No cached runs found for {}", scenario_path.display());
    } else {
        println!("Cached runs:");
        for manifest in runs {
            println!(
                "  {} ({}, {} steps, {})",
                manifest.run_id, manifest.timestamp, manifest.steps, manifest.engine
            );
        }
    }
    Ok(())
}

fn cmd_show_run(scenario_path: &Path, run_id: &str) -> AppResult<()> {
    let (manifest, records) = run_service::load_run(scenario_path, run_id)?;

    println!("Run {}", manifest.run_id);
    println!("  Scenario: {}", manifest.scenario);
    println!("  Engine:   {}", manifest.engine);
    println!("  Steps:    {} x {} s", manifest.steps, manifest.time_step_s);
    if let (Some(first), Some(last)) = (records.first(), records.last()) {
        println!("  Time range: {} - {}", first.time, last.time);
    }
    println!("\nKeys:");
    for key in &manifest.keys {
        println!("  {}", key);
    }
    Ok(())
}

fn cmd_export_series(
    scenario_path: &Path,
    run_id: &str,
    key: &str,
    output: Option<&Path>,
) -> AppResult<()> {
    let series = query::extract_series(scenario_path, run_id, key)?;

    if let Some(path) = output {
        let file = std::fs::File::create(path)?;
        dss_results::write_series_csv(file, key, &series)?;
        println!(
            "✓ Exported {} data points to {}",
            series.len(),
            path.display()
        );
    } else {
        dss_results::write_series_csv(io::stdout().lock(), key, &series)?;
    }
    Ok(())
}
