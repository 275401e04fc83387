use std::io;

use anyhow::{Context, Result};
use log::info;

use wayfinder::config::ServiceConfig;
use wayfinder::server::Server;
use wayfinder::service::HttpStoryService;
use wayfinder::tools::StoryTools;

fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the protocol. Control verbosity with RUST_LOG:
    //   RUST_LOG=info   wayfinder   # tool calls + transitions
    //   RUST_LOG=debug  wayfinder   # + protocol messages and service payloads
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        eprintln!(
            "Usage: wayfinder [api_base_url] [timeout_secs]\n\
             \n\
             Example:\n  wayfinder http://localhost:8000/api 30\n\
             \n\
             Environment: WAYFINDER_API_URL, WAYFINDER_TIMEOUT_SECS, RUST_LOG"
        );
        return Ok(());
    }

    let config = ServiceConfig::from_env()
        .with_overrides(args.get(1).map(String::as_str), args.get(2).map(String::as_str));

    info!("API base URL : {}", config.base_url);
    info!("Timeout      : {:?}", config.timeout);

    let service = HttpStoryService::new(&config).context("failed to build story service client")?;
    let mut server = Server::new(StoryTools::new(service));

    server.run(io::stdin().lock(), io::stdout().lock())
}
