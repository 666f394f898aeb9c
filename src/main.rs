use anyhow::Result;
use clap::Parser;
use log::info;

mod cli;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // log to a file so command output stays clean
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open("qb-cli.log")?;
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();

    let cli = Cli::parse();
    info!("Starting qb-cli");

    cli::run(cli).await
}
