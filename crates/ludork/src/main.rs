//! Ludork
//!
//! Headless game loop that spawns the project's actors and ticks their
//! blueprint graphs.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use blueprint_runtime::DirectoryClassStore;
use blueprint_types::Handle;

use ludork::config::{CliOverrides, EngineConfig};
use ludork::engine::World;
use ludork::project::ProjectLoader;

/// Ludork blueprint game runtime
#[derive(Parser, Debug)]
#[command(name = "ludork")]
#[command(about = "Headless blueprint game runtime", long_about = None)]
struct Args {
    /// Path to the project directory
    #[arg(short, long, default_value = "./demos/sample")]
    project: PathBuf,

    /// Frames per second
    #[arg(long)]
    tick_rate: Option<f64>,

    /// Stop after this many frames
    #[arg(long)]
    max_ticks: Option<u64>,

    /// Transition limit for a single graph execution
    #[arg(long)]
    step_limit: Option<usize>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<()> {
    let cli = CliOverrides {
        tick_rate: args.tick_rate,
        max_ticks: args.max_ticks,
        step_limit: args.step_limit,
    };
    let config = EngineConfig::load(&args.project, &cli)?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Ludork v{}", env!("CARGO_PKG_VERSION"));

    let project = ProjectLoader::load(&args.project).await?;
    info!("Loaded project: {}", project.name());

    let store = DirectoryClassStore::new(project.path.join(&config.classes_dir));
    let mut world = World::new(store)?.with_step_limit(config.step_limit);

    for spec in project.actors() {
        if let Err(e) = world.spawn(&spec.class, &spec.name) {
            error!(actor = %spec.name, class = %spec.class, "Failed to spawn actor: {}", e);
        }
    }

    run(&mut world, &config).await;

    let handles: Vec<Handle> = world.actors().iter().map(|a| a.handle.clone()).collect();
    for handle in handles {
        if let Err(e) = world.destroy(&handle) {
            warn!(id = %handle.id, "onDestroy failed: {}", e);
        }
    }

    info!("Ludork stopped");
    Ok(())
}

/// Drive frames until `max_ticks` or Ctrl+C
async fn run(world: &mut World, config: &EngineConfig) {
    let dt = config.frame_delta();
    let fixed_dt = config.fixed_delta();

    let mut interval = tokio::time::interval(Duration::from_secs_f64(dt));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut ticks: u64 = 0;
    let mut accumulator = 0.0;

    info!(tick_rate = config.tick_rate, actors = world.actors().len(), "Game loop started");

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
            _ = interval.tick() => {}
        }

        accumulator += dt;
        while accumulator >= fixed_dt {
            world.fixed_tick(fixed_dt);
            accumulator -= fixed_dt;
        }

        let report = world.tick(dt);
        if !report.failures.is_empty() || !report.latent.failures.is_empty() {
            warn!(
                time = report.time,
                failed = report.failures.len(),
                failed_resumes = report.latent.failures.len(),
                "Frame finished with errors"
            );
        }

        ticks += 1;
        if config.max_ticks.is_some_and(|max| ticks >= max) {
            info!(ticks, "Reached max_ticks");
            break;
        }
    }
}
