mod cli;

use std::path::Path;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use segforge::discover::{discover_sources, SourceFilter};
use segforge::logging;
use sg_av::{MediaInspector, MediaSummary, ToolRegistry};
use sg_core::config::Config;
use sg_core::SegmentPlan;
use sg_pipeline::{run_batch, PipelineContext, PipelineExecutor};

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_format, cli.log_file.as_deref())?;

    match cli.command {
        Commands::Run { input } => {
            let config = Config::load_optional(cli.config.as_deref())?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_file(&input, &config))
        }
        Commands::Batch { dir } => {
            let config = Config::load_optional(cli.config.as_deref())?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_dir(dir.as_deref(), &config))
        }
        Commands::Probe { file, json } => {
            let config = Config::load_optional(cli.config.as_deref())?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_file(&file, json, &config))
        }
        Commands::CheckTools => {
            let config = Config::load_optional(cli.config.as_deref())?;
            check_tools(&config)
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("segforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Build the pipeline context and cancel it on Ctrl-C.
fn pipeline_context(config: &Config) -> Result<PipelineContext> {
    let token = CancellationToken::new();
    let ctx = PipelineContext::new(config)?.with_cancellation(token.clone());

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; stopping running transcodes");
            token.cancel();
        }
    });
    Ok(ctx)
}

async fn run_file(input: &Path, config: &Config) -> Result<()> {
    let ctx = pipeline_context(config)?;
    let output = PipelineExecutor::new(ctx).run(input).await?;
    println!("{}", output.display());
    Ok(())
}

async fn run_dir(dir: Option<&Path>, config: &Config) -> Result<()> {
    let Some(root) = dir.or(config.batch.root.as_deref()) else {
        anyhow::bail!("No directory given; pass --dir or set batch.root in the config");
    };

    let filter = SourceFilter::new(&config.batch.extensions, &config.transcode.output_extension);
    let files = discover_sources(root, &filter)?;
    if files.is_empty() {
        println!("No source files found under {}", root.display());
        return Ok(());
    }

    let ctx = pipeline_context(config)?;
    let report = run_batch(ctx, files, config.batch.concurrency).await;

    for (source, output) in &report.succeeded {
        println!("✓ {} -> {}", source.display(), output.display());
    }
    for (source, err) in &report.failed {
        println!("✗ {}: {err}", source.display());
    }
    println!(
        "\n{} succeeded, {} failed",
        report.succeeded.len(),
        report.failed.len()
    );

    if !report.is_success() {
        anyhow::bail!("{} file(s) failed", report.failed.len());
    }
    Ok(())
}

#[derive(Serialize)]
struct ProbeReport<'a> {
    file: &'a Path,
    #[serde(flatten)]
    summary: MediaSummary,
    plan: Option<SegmentPlan>,
}

async fn probe_file(file: &Path, json: bool, config: &Config) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let tools = ToolRegistry::discover(&config.tools);
    let inspector = MediaInspector::new(&tools, config.tools.probe_timeout())?;
    let summary = inspector.probe(file).await?;
    let plan = SegmentPlan::compute(
        summary.duration,
        config.transcode.parallelism(),
        config.transcode.min_segment_secs,
    )
    .ok();

    if json {
        let report = ProbeReport {
            file,
            summary,
            plan,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("File: {}", file.display());
    let secs = summary.duration as u64;
    println!(
        "Duration: {:02}:{:02}:{:02} ({:.3}s)",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        summary.duration
    );
    println!("Frames: {}", summary.frame_count);
    println!("Audio: {}", if summary.has_audio { "yes" } else { "no" });
    match plan {
        Some(plan) => println!(
            "Plan: {} segment(s) of {}s",
            plan.segment_count, plan.unit_duration
        ),
        None => println!("Plan: none (zero-length source)"),
    }
    Ok(())
}

fn check_tools(config: &Config) -> Result<()> {
    println!("Checking external tools...\n");

    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install ffmpeg to transcode.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = Config::load(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("  Output extension: {}", config.transcode.output_extension);
    println!("  Audio extension: {}", config.transcode.audio_extension);
    println!("  Workers: {}", config.transcode.parallelism());
    println!("  Batch concurrency: {}", config.batch.concurrency.max(1));

    let warnings = config.validate();
    if !warnings.is_empty() {
        println!("\nWarnings:");
        for w in &warnings {
            println!("  - {w}");
        }
    }

    Ok(())
}
