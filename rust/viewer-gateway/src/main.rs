use anyhow::Result;
use clap::Parser;
use viewer_core::tracing::initialize_tracing;
use viewer_gateway::{serve, Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    initialize_tracing(None);

    let args = Cli::parse();

    match args.command {
        Command::Serve(args) => serve(args.to_config()).await?,
    };
    Ok(())
}
