pub mod agent;
pub mod analyzer;
pub mod cli;
pub mod config;
pub mod history;
pub mod knowledge;
pub mod models;
pub mod response;
pub mod reveal;
pub mod server;
pub mod session;
pub mod terminal;

use agent::SymptomAgent;
use cli::{ Args, RunMode };
use log::{ info, log, Level };
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    // In chat mode stdout belongs to the conversation, so keep startup quiet.
    let level = if args.mode == RunMode::Chat { Level::Debug } else { Level::Info };
    log!(level, "--- Core Configuration ---");
    log!(level, "Run Mode: {}", args.mode);
    log!(level, "Knowledge Path: {}", args.knowledge_path.as_deref().unwrap_or("(built-in)"));
    log!(level, "Thinking Delay: {}ms", args.thinking_delay_ms);
    log!(level, "Reveal Interval: {}ms", args.reveal_interval_ms);
    if args.mode == RunMode::Server {
        log!(level, "Server Address: {}", args.server_addr);
        log!(level, "HTTP Port: {:?}", args.http_port);
        log!(level, "TLS Enabled: {}", args.tls_enabled());
        log!(level, "Handshake Auth: {}", args.server_api_key.is_some());
    }
    log!(level, "-------------------------");

    let agent = Arc::new(SymptomAgent::new(&args)?);

    match args.mode {
        RunMode::Chat => terminal::run_chat(agent, args.reveal_interval()).await,
        RunMode::Server => {
            let addr = args.server_addr.clone();
            info!("Starting server on: {}", addr);
            let server = Server::new(addr, agent, args.clone());
            server.run().await
        }
    }
}
