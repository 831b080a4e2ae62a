// Copyright (c) 2025 Hume Nano
// This file is part of the rust-rheed project and is licensed under the
// MIT License (see LICENSE.md for details).

// Main entry point for the RHEED oscillation analyzer
mod acquisition;
mod config;
mod preprocessing;
mod processing;

use anyhow::Result;
use clap::Parser;
use config::Config;
use log::info;

use processing::{
    AnalysisEvent, BatchAnalysisPipeline, EventStreamConsumer, LiveAnalysisPipeline,
    SharedAnalysisState, SharedEventStream,
};
use std::path::{Path, PathBuf};
use tokio::signal;

/// RHEED intensity oscillation analyzer for MBE growth monitoring
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Input video file to analyze in batch mode
    #[arg(long)]
    input_file: Option<PathBuf>,

    /// Capture device index for live analysis
    #[arg(long)]
    device: Option<u32>,

    /// Use the built-in synthetic oscillation source for live analysis
    #[arg(long, default_value_t = false)]
    mock: bool,

    /// Lattice constant in Angstroms (overrides configuration)
    #[arg(long)]
    lattice: Option<f64>,

    /// Keep one frame out of every N (overrides configuration)
    #[arg(long)]
    frame_stride: Option<u64>,

    /// Write the session to this path after the run (.json or .csv)
    #[arg(long)]
    export: Option<PathBuf>,

    /// Load a previously exported JSON session and print its metrics
    #[arg(long)]
    import: Option<PathBuf>,

    /// Path to configuration file (YAML format)
    #[arg(long)]
    config: Option<PathBuf>,

    /// List available capture devices and exit
    #[arg(long = "list-devices", default_value_t = false)]
    list_devices: bool,

    /// Enable verbose logging (debug level)
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Disable all logging output
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.quiet {
        log::LevelFilter::Off
    } else if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("config.yaml"));
    let mut config = Config::from_file(&config_path)?;
    config.apply_args(args.lattice, args.frame_stride);
    config.validate()?;

    if args.list_devices {
        let devices = acquisition::list_video_devices(config.acquisition.device_probe_range);
        if devices.is_empty() {
            println!("No capture devices found");
        } else {
            println!("Available capture devices:");
            for index in devices {
                println!("- /dev/video{}", index);
            }
        }
        return Ok(());
    }

    let state = SharedAnalysisState::new(config.analysis.lattice_constant_angstrom);
    let events = SharedEventStream::new();

    if let Some(import_path) = &args.import {
        processing::import_json(&state, import_path).await?;
        info!("Imported session from {}", import_path.display());
        print_metrics(&state).await;
        if let Some(export_path) = &args.export {
            export_session(&state, export_path).await?;
        }
        return Ok(());
    }

    if let Some(input_file) = &args.input_file {
        run_batch(&config, state.clone(), events, input_file).await?;
    } else if args.device.is_some() || args.mock {
        run_live(&args, &config, state.clone(), events).await?;
    } else {
        anyhow::bail!("Nothing to do: pass --input-file, --device, --mock or --import");
    }

    print_metrics(&state).await;
    if let Some(export_path) = &args.export {
        export_session(&state, export_path).await?;
    }
    Ok(())
}

/// Analyze a recorded video to exhaustion, showing progress on stderr.
async fn run_batch(
    config: &Config,
    state: SharedAnalysisState,
    events: SharedEventStream,
    input_file: &Path,
) -> Result<()> {
    let source = acquisition::get_video_source_from_file(input_file, &config.acquisition)?;
    let pipeline = BatchAnalysisPipeline::new(
        source,
        state,
        events.clone(),
        &config.analysis,
        config.acquisition.frame_stride,
    );

    let mut consumer = EventStreamConsumer::new(&events);
    let progress = tokio::spawn(async move {
        while let Some(event) = consumer.next_event().await {
            match event {
                AnalysisEvent::Progress(pct) => eprint!("\rAnalyzing: {:3}%", pct),
                AnalysisEvent::Completed => {
                    eprintln!();
                    break;
                }
                AnalysisEvent::DataPoint { .. } => {}
            }
        }
    });

    pipeline.run().await?;
    progress.await?;
    Ok(())
}

/// Capture and analyze frames until Ctrl-C.
async fn run_live(
    args: &Args,
    config: &Config,
    state: SharedAnalysisState,
    events: SharedEventStream,
) -> Result<()> {
    let source: Box<dyn acquisition::VideoSource> = if args.mock {
        Box::new(acquisition::MockSource::endless(
            config.acquisition.fallback_fps,
        ))
    } else {
        let device = args.device.unwrap_or(0);
        acquisition::get_video_source_from_device(device, &config.acquisition)?
    };

    let pipeline = LiveAnalysisPipeline::new(
        source,
        state.clone(),
        events,
        &config.analysis,
        config.acquisition.frame_stride,
    );
    let control = pipeline.control();
    let handle = tokio::spawn(pipeline.run());

    info!("Live analysis running, press Ctrl-C to stop");
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received shutdown signal, stopping live analysis");
            control.stop();
        }
        Err(err) => {
            eprintln!("Error waiting for shutdown signal: {}", err);
            control.stop();
        }
    }
    handle.await??;
    Ok(())
}

/// Print layer count, thickness and growth rate for the current session.
async fn print_metrics(state: &SharedAnalysisState) {
    let snapshot = state.snapshot().await;
    let metrics = snapshot.derived_metrics();
    println!("Samples:     {}", snapshot.sample_count());
    println!("Layers:      {}", metrics.peak_count);
    println!("Thickness:   {:.3} nm", metrics.thickness_nm);
    println!("Growth rate: {:.3} nm/hr", metrics.growth_rate_nm_per_hr);
}

/// Export as CSV or JSON depending on the file extension.
async fn export_session(state: &SharedAnalysisState, path: &Path) -> Result<()> {
    let snapshot = state.snapshot().await;
    let is_csv = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);
    if is_csv {
        processing::export_csv(&snapshot, path)?;
    } else {
        processing::export_json(&snapshot, path)?;
    }
    info!("Session exported to {}", path.display());
    Ok(())
}
