//! pipectl - Desktop Driver
//!
//! Thin command-line shell over the controller: builds a pipeline from a
//! description, requests a run-state, optionally pushes a properties document
//! after a delay, and logs every callback until end-of-stream, an error, or
//! the time limit.

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use crossbeam_channel::{after, never, select, unbounded};
use pipectl::config::PlayerConfig;
use pipectl::{Controller, MediaEngine, PlayerEvent, RunState};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EngineChoice {
    /// In-process simulated engine
    Sim,
    /// System GStreamer
    Gstreamer,
}

#[derive(Debug, Parser)]
#[command(name = "pipectl", version, about = "Drive a media pipeline from the command line")]
struct Args {
    /// Pipeline description, e.g. "videotestsrc name=v ! autovideosink"
    description: String,

    /// Run-state to request once the pipeline is built
    #[arg(long, default_value = "playing")]
    state: RunState,

    /// JSON properties document to push after the delay
    #[arg(long)]
    properties: Option<String>,

    /// Delay before pushing the properties document
    #[arg(long, default_value_t = 3000)]
    properties_delay_ms: u64,

    /// Stop after this many milliseconds
    #[arg(long)]
    duration_ms: Option<u64>,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Display tag for logs
    #[arg(long)]
    tag: Option<String>,

    /// Engine to drive
    #[arg(long, value_enum, default_value_t = default_engine())]
    engine: EngineChoice,
}

fn default_engine() -> EngineChoice {
    if cfg!(feature = "gstreamer") {
        EngineChoice::Gstreamer
    } else {
        EngineChoice::Sim
    }
}

fn init_logging(config: &PlayerConfig) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));

    let Some(path) = config.logging.log_file.as_ref() else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
        return Ok(None);
    };

    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| std::path::Path::new("."));
    let file_name = path
        .file_name()
        .context("log_file must name a file")?;
    let appender = tracing_appender::rolling::never(directory, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer))
        .init();
    Ok(Some(guard))
}

fn build_engine(choice: EngineChoice) -> anyhow::Result<Box<dyn MediaEngine>> {
    match choice {
        EngineChoice::Sim => {
            #[cfg(feature = "sim-engine")]
            {
                Ok(Box::new(pipectl::SimEngine::new()))
            }
            #[cfg(not(feature = "sim-engine"))]
            {
                bail!("built without the sim-engine feature")
            }
        }
        EngineChoice::Gstreamer => {
            #[cfg(feature = "gstreamer")]
            {
                Ok(Box::new(pipectl::GstEngine::new()?))
            }
            #[cfg(not(feature = "gstreamer"))]
            {
                bail!("built without the gstreamer feature")
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = PlayerConfig::load_or_default_from(args.config.as_deref());
    let _log_guard = init_logging(&config)?;

    if let Some(document) = args.properties.as_deref() {
        serde_json::from_str::<serde_json::Value>(document)
            .context("--properties is not valid JSON")?;
    }

    let engine = build_engine(args.engine)?;
    tracing::info!("Starting pipectl with {} ({})", engine.name(), engine.version());

    let tag = args
        .tag
        .clone()
        .unwrap_or_else(|| config.controller.default_tag.clone());
    let (events_tx, events_rx) = unbounded::<PlayerEvent>();
    let controller = Controller::builder(tag)
        .config(config.controller.clone())
        .build(engine, events_tx)
        .context("Failed to start controller")?;

    controller.set_description(args.description.as_str())?;
    controller.set_desired_state(args.state)?;

    let properties_timer = match args.properties {
        Some(_) => after(Duration::from_millis(args.properties_delay_ms)),
        None => never(),
    };
    let deadline = match args.duration_ms {
        Some(ms) => after(Duration::from_millis(ms)),
        None => never(),
    };

    let mut failed = false;
    loop {
        select! {
            recv(events_rx) -> event => {
                let Ok(event) = event else { break };
                match event {
                    PlayerEvent::Loaded => tracing::info!("Player loaded"),
                    PlayerEvent::StateChanged { new, old } => {
                        tracing::info!("State changed: {} -> {}", old, new)
                    }
                    PlayerEvent::EndOfStream => {
                        tracing::info!("End of stream");
                        break;
                    }
                    PlayerEvent::Error {
                        source,
                        message,
                        debug: detail,
                    } => {
                        tracing::error!("Error from {}: {} ({})", source, message, detail);
                        failed = true;
                        break;
                    }
                    PlayerEvent::ElementMessage { element, json } => {
                        tracing::info!("Message from {}: {}", element, json)
                    }
                }
            }
            recv(properties_timer) -> _ => {
                if let Some(document) = args.properties.as_deref() {
                    tracing::info!("Applying properties");
                    controller.set_properties(document)?;
                }
            }
            recv(deadline) -> _ => {
                tracing::info!("Time limit reached");
                break;
            }
        }
    }

    tracing::info!("Shutting down...");
    controller.destroy();

    if failed {
        bail!("pipeline reported an error");
    }
    Ok(())
}
