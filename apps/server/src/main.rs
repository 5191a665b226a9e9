#![warn(clippy::all, clippy::pedantic)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use checker::Checker;
use clap::Parser;
use tracing::{debug, info};

mod config;
mod engine;
mod error;
mod routes;

use config::Config;
use engine::Engine;
use error::AppError;
use logger::init_with;

#[derive(Debug, Parser)]
#[command(version, about = "Health check scheduler and runner")]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, env = "CHECKER_CONFIG")]
    config: Option<PathBuf>,
}

#[actix_web::main]
async fn main() -> Result<(), AppError> {
    let args = Args::parse();
    let config = Config::from_config(args.config.as_deref())?;
    init_with(&config.logging.level, Some(&config.logging.format));
    debug!("{config}");

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let engine = Engine::start(&config)?;

    let result = run_server(addr, engine.checker()).await;
    engine.shutdown().await;
    result
}

async fn run_server(addr: SocketAddr, checker: Arc<Checker>) -> Result<(), AppError> {
    info!("Listening on {addr}");
    let checker = web::Data::from(checker);

    HttpServer::new(move || App::new().app_data(checker.clone()).configure(routes::routes))
        .bind(addr)?
        .run()
        .await?;

    Ok(())
}
