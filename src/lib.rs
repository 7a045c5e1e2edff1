pub mod cli;
pub mod core;
pub mod providers;

use crate::core::config::AppConfig;
use crate::core::{RateBoard, RateFeed};
use crate::providers::cbr::CbrFeedProvider;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    List,
    Convert {
        amount: String,
        from: String,
        to: String,
    },
    Interactive,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("kurs starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let feed = CbrFeedProvider::new(&config.feed);
    let board = RateBoard::new(config.base_currency);

    match command {
        AppCommand::List => cli::rates::run(&board, &feed).await,
        AppCommand::Convert { amount, from, to } => {
            cli::convert::run(&board, &feed, &amount, &from, &to).await
        }
        AppCommand::Interactive => {
            let feed: Arc<dyn RateFeed> = Arc::new(feed);
            let input = tokio::io::BufReader::new(tokio::io::stdin());
            cli::interactive::run(Arc::new(board), feed, input, &mut std::io::stdout()).await
        }
    }
}
