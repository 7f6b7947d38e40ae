use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::Result;
use eyre::Context as _;
use irc_bot::{Bot, BotConfig, logging};
use log::*;

#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// the bot config file
    #[arg(short, long, default_value = "irc_bot.toml")]
    config: PathBuf,

    #[arg(long, default_value_t = LevelFilter::Info)]
    log_level: LevelFilter,

    #[arg(long, default_value = "./logs/")]
    log_dir: PathBuf,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    let log_path = logging::init(&args.log_dir, env!("CARGO_PKG_NAME"), args.log_level)
        .wrap_err("could not set up logging")?;

    let config = BotConfig::load(&args.config)
        .wrap_err_with(|| format!("could not load {}", args.config.display()))?;
    info!(
        "loaded {} with {} networks",
        args.config.display(),
        config.networks.len()
    );

    let bot = Bot::from_config(config).wrap_err("could not create the bot")?;
    bot.start().wrap_err("could not start connections")?;
    eprintln!("running, logging to {}", log_path.display());

    // connections run until they are halted, which nothing in this binary does
    bot.join();
    info!("all connections stopped");
    Ok(())
}
