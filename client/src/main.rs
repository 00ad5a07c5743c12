use anyhow::Context;
use clap::{value_parser, Arg, Command};
use std::{io, path::PathBuf};
use tip_jar_sim::{stage, Orchestrator, Scenario};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Parse arguments
    let matches = Command::new("tip-jar-sim")
        .about("open a tip jar, tip it from several wallets, withdraw, and replay the comments")
        .arg(
            Arg::new("config")
                .long("config")
                .env("TIP_JAR_CONFIG")
                .required(false)
                .value_parser(value_parser!(PathBuf))
                .help("TOML scenario; the stock walkthrough runs without one"),
        )
        .get_matches();

    // Create logger
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let scenario = match matches.get_one::<PathBuf>("config") {
        Some(path) => Scenario::load(path)
            .with_context(|| format!("loading scenario from {}", path.display()))?,
        None => Scenario::default(),
    };
    tracing::info!(tips = scenario.tips.len(), "loaded scenario");

    let stage = stage(&scenario);
    let mut orchestrator = Orchestrator::new(stage.env, io::stdout().lock());
    let jar = orchestrator.run(&stage.owner, &stage.tips)?;
    tracing::info!(jar = %jar, "walkthrough complete");

    Ok(())
}
