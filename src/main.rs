use election_results::config::Config;
use election_results::db::Database;
use election_results::export;
use election_results::tasks::election_closer;
use election_results::ResultsCache;
use log::{error, info};
use std::env;
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let database = match Database::from_config(&config).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let cache = ResultsCache::new(database.clone()).preload_on_close(config.preload_on_close);

    // With election ids on the command line, print their results and exit
    let election_ids: Vec<String> = env::args().skip(1).collect();
    if !election_ids.is_empty() {
        return print_results(&cache, &election_ids).await;
    }

    let closer = tokio::spawn(election_closer::check_overdue_elections_task(
        Arc::clone(&database),
        cache.clone(),
        config.close_check_interval,
    ));

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutting down."),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }
    closer.abort();

    ExitCode::SUCCESS
}

async fn print_results(cache: &ResultsCache, election_ids: &[String]) -> ExitCode {
    let mut status = ExitCode::SUCCESS;

    for election_id in election_ids {
        match cache.get(election_id).await {
            Ok(snapshot) => match export::to_json(&snapshot) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    error!("Failed to serialize results for election {}: {}", election_id, e);
                    status = ExitCode::FAILURE;
                }
            },
            Err(e) if e.is_retryable() => {
                error!("Results for election {} unavailable, try again: {}", election_id, e);
                status = ExitCode::FAILURE;
            }
            Err(e) => {
                error!("Results for election {} failed: {}", election_id, e);
                status = ExitCode::FAILURE;
            }
        }
    }

    status
}
