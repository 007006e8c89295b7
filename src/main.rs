use anyhow::Result;
use clap::Parser;
use microbank::cli::Cli;
use microbank::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    cli.run().await
}
