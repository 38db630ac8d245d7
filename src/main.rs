mod chart;
mod config;
mod detector;
mod history;
mod janitor;
mod klines;
mod market;
mod notify;
mod scanner;
mod scheduler;
mod storage;
mod throttle;

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let data_dir = std::env::var("SCREENER_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"));

    scheduler::run_forever(data_dir).await;
}
