pub mod api;
pub mod tls;
pub mod websocket;

use crate::agent::SymptomAgent;
use crate::cli::Args;
use std::error::Error;
use std::sync::Arc;

pub struct Server {
    addr: String,
    agent: Arc<SymptomAgent>,
    args: Args,
}

impl Server {
    pub fn new(addr: String, agent: Arc<SymptomAgent>, args: Args) -> Self {
        Self { addr, agent, args }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        if let Some(http_port) = self.args.http_port {
            api::start_http_server(http_port, self.agent.clone(), &self.args).await?;
        }

        websocket::start_ws_server(
            &self.addr,
            self.agent.clone(),
            self.args.server_api_key.clone(),
            self.args.clone()
        ).await
    }
}
