use std::{error::Error, process::ExitCode};

use clap::Parser;
use log::{error, info};
use shopsync::{
    config::{load_dotenv, Config},
    db::{hamamatsu::transform::SyncMode, prod_db::ProdDb},
    job::Status,
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Environment name, e.g., test, prod
    #[arg(short, long, default_value = "prod")]
    env: String,

    /// Output layout, overrides SYNC_MODE
    #[arg(short, long, value_enum)]
    mode: Option<SyncMode>,
}

async fn run(args: Args) -> Result<Status, Box<dyn Error>> {
    load_dotenv(&args.env);
    let mut config = Config::from_env();
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    info!("syncing certified shops, mode {}", config.mode);

    let job = ProdDb::certified_shops_job(&config).await?;
    Ok(job.handle().await)
}

/// Run this job every hour
#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();

    let status = match run(args).await {
        Ok(status) => status,
        Err(e) => {
            error!("{:?}", e);
            Status {
                status_code: 500,
                body: "error".to_string(),
            }
        }
    };
    match serde_json::to_string(&status) {
        Ok(s) => info!("{}", s),
        Err(e) => error!("{}", e),
    }
    if status.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
