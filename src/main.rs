use std::error::Error;
use std::sync::Arc;

use log::{error, info};

mod config;
mod core;
mod payment;
mod store;
mod web;

use crate::config::Config;
use crate::payment::MidtransGateway;
use crate::store::Store;
use crate::web::server::{start_web_server, AppState};

#[tokio::main]
async fn main() {
    // Pick up a local .env before anything reads the environment
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    info!("Starting rental desk...");

    if let Err(e) = run().await {
        error!("Rental desk stopped: {}", e);
        std::process::exit(1);
    }

    info!("Rental desk shutdown complete");
}

async fn run() -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;
    info!("Configuration loaded");

    let store = Store::open(&config.database_path)?;
    info!("Database ready at {}", config.database_path);

    let gateway = MidtransGateway::new(&config.midtrans_base_url, &config.midtrans_server_key)?;
    let state = AppState::new(config, store, Arc::new(gateway))?;

    // Start the web interface
    let server = start_web_server(state)?;
    let handle = server.handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutting down rental desk..."),
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
        // Finish in-flight requests before stopping
        handle.stop(true).await;
    });

    info!("Rental desk is now running. Press Ctrl+C to stop.");
    server.await?;
    Ok(())
}
