use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use dotenvy::dotenv;
use threads_sheets_sync::config::{Args, RunParameters};
use threads_sheets_sync::telemetry;
use tracing::error;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    dotenv().ok();
    let args = Args::parse();
    telemetry::init_subscriber(&args.log_level);

    if let Err(err) = run(args).await {
        error!("{err:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let params = RunParameters::from_args(args, Utc::now()).context("Invalid arguments")?;
    threads_sheets_sync::run(&params)
        .await
        .with_context(|| format!("Sync into worksheet `{}` failed", params.worksheet))?;
    Ok(())
}
