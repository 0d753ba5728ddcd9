use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

mod commands;
mod config;
mod overlay;
mod pipeline;
mod safety;
mod sim;
mod teleop;
mod vision;

use crate::config::EbrakeConfig;
use crate::pipeline::BrakePipeline;
use crate::sim::SimEnv;
use crate::teleop::InputSource;

#[derive(Parser)]
#[command(name = "ebrake")]
#[command(about = "Vision-driven emergency-braking interlock for a simulated robot")]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Simulated scenario to load (overrides the config file)
    #[arg(long)]
    env_name: Option<String>,

    /// Map to load within the scenario (overrides the config file)
    #[arg(long)]
    map_name: Option<String>,

    /// Replay a forward-driving script instead of reading operator input
    #[arg(long)]
    demo: bool,

    /// Number of scripted cycles in demo mode
    #[arg(long, default_value = "60")]
    demo_cycles: usize,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(format!("ebrake={}", log_level))
        .try_init();

    info!("Starting ebrake - vision-driven emergency-braking interlock");

    let mut config = EbrakeConfig::load(&args.config).await?;
    if let Some(env_name) = args.env_name {
        config.environment.env_name = env_name;
    }
    if let Some(map_name) = args.map_name {
        config.environment.map_name = map_name;
    }
    info!(
        "Configuration loaded: {} / {}, alert threshold {}",
        config.environment.env_name,
        config.environment.map_name,
        config.safety.alert_threshold
    );

    let env = SimEnv::new(&config.environment)?;

    let mut input = if args.demo {
        info!("Running scripted demo for {} cycles", args.demo_cycles);
        InputSource::demo(args.demo_cycles)
    } else {
        info!("Interactive teleop: w/s/a/d/q/e to drive, x or quit to exit");
        InputSource::interactive()
    };

    let mut pipeline = BrakePipeline::new(Box::new(env), config);
    match pipeline.run(&mut input).await {
        Ok(summary) => {
            info!(
                "Run complete: {} cycles, {} with alert raised, final position {:?}",
                summary.cycles, summary.alert_cycles, summary.final_position
            );
            Ok(())
        }
        Err(e) => {
            error!("Pipeline error: {}", e);
            Err(e)
        }
    }
}
