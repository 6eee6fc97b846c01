use anyhow::Result;
use clap::Parser;
use wallpaper_lense::cli::{self, Cli};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cli::init_logging(cli.verbose);

    cli::run(cli).await?;
    Ok(())
}
