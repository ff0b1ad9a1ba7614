use anyhow::Context;
use clap::Parser;
use dread_core::{Clock, DreadConfig, ManualClock, SystemClock};
use dread_engine::{
    Coordinator, CoordinatorHandle, CoordinatorSnapshot, EffectHandler, EventStatistics,
    PerformanceMetrics,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

mod demo_handler;

use demo_handler::demo_handlers;

#[derive(Parser, Debug)]
#[command(name = "dread", author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML config file (defaults are used if it is missing)
    #[arg(short, long, env = "DREAD_CONFIG", default_value = "dread.toml")]
    config: PathBuf,

    /// Session length to run, in minutes
    #[arg(short, long, default_value_t = 30)]
    minutes: u64,

    /// Seed for every random draw (simulation only)
    #[arg(long)]
    seed: Option<u64>,

    /// Run against the wall clock instead of simulating
    #[arg(long)]
    real_time: bool,

    /// Simulated user activity interval in seconds (0 = user goes away)
    #[arg(long, default_value_t = 20)]
    activity_every: u64,

    /// Make this demo handler fail initialization (visual, audio, entity, typing, time)
    #[arg(long)]
    fail_handler: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Serialize)]
struct Summary {
    statistics: EventStatistics,
    metrics: PerformanceMetrics,
    state: CoordinatorSnapshot,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    let _guard = init_logging(args.json, args.log_file.as_deref())?;

    let config = DreadConfig::load_or_default(&args.config);
    info!(
        "Loaded config ({} event kind(s), {} sub-trigger(s))",
        config.events.len(),
        config.sub_triggers.len()
    );

    let summary = if args.real_time {
        run_real_time(config, &args).await?
    } else {
        simulate(config, &args).await
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn init_logging(
    json: bool,
    log_file: Option<&Path>,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "dread=info,dread_engine=info,dread_core=info,warn".into());

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .with_context(|| format!("Log file path has no file name: {}", path.display()))?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    // stdout carries the JSON summary, so console logs go to stderr.
    let json_layer = json.then(|| fmt::layer().json().with_writer(std::io::stderr));
    let text_layer = (!json).then(|| {
        fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

/// Run a whole session on a manual clock, one simulated second per step.
async fn simulate(config: DreadConfig, args: &Args) -> Summary {
    let clock = ManualClock::new(0);
    let shared: Arc<dyn Clock> = Arc::new(clock.clone());
    let mut coordinator = match args.seed {
        Some(seed) => Coordinator::with_seed(config, shared, seed),
        None => Coordinator::new(config, shared),
    };

    for (name, handler) in demo_handlers(args.fail_handler.as_deref()) {
        coordinator.register_effect_handler(name, handler).await;
    }
    coordinator.initialize().await;

    let total_secs = args.minutes * 60;
    info!("Simulating {} minute(s)", args.minutes);
    for elapsed in 1..=total_secs {
        clock.advance(Duration::from_secs(1));
        if args.activity_every > 0 && elapsed % args.activity_every == 0 {
            coordinator.record_activity();
        }
        coordinator.tick().await;
    }
    coordinator.settle().await;

    let summary = Summary {
        statistics: coordinator.get_event_statistics(),
        metrics: coordinator.get_performance_metrics(),
        state: coordinator.get_state(),
    };
    coordinator.dispose();
    summary
}

/// Drive the coordinator from its background loop until the time is up or
/// Ctrl-C arrives.
async fn run_real_time(config: DreadConfig, args: &Args) -> anyhow::Result<Summary> {
    let coordinator = Coordinator::new(config, Arc::new(SystemClock));
    let handle = CoordinatorHandle::new(coordinator);

    for (name, handler) in demo_handlers(args.fail_handler.as_deref()) {
        let handler: Arc<dyn EffectHandler> = handler;
        handle.register_effect_handler(name, handler).await;
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let task = handle.spawn(shutdown_rx);
    info!("Running for {} minute(s), Ctrl-C to stop", args.minutes);

    let deadline = tokio::time::sleep(Duration::from_secs(args.minutes * 60));
    tokio::pin!(deadline);
    let mut activity = tokio::time::interval(Duration::from_secs(args.activity_every.max(1)));

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            _ = activity.tick(), if args.activity_every > 0 => {
                handle.record_activity().await;
            }
        }
    }

    let summary = Summary {
        statistics: handle.get_event_statistics().await,
        metrics: handle.get_performance_metrics().await,
        state: handle.get_state().await,
    };

    shutdown_tx
        .send(true)
        .context("Coordinator loop already stopped")?;
    task.await.context("Coordinator loop panicked")?;
    Ok(summary)
}
