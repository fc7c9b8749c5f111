use clap::{ Parser, ValueEnum };
use std::fmt;
use std::time::Duration;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Interactive chat on the terminal.
    Chat,
    /// WebSocket chat server (plus optional HTTP API).
    Server,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Chat => write!(f, "chat"),
            RunMode::Server => write!(f, "server"),
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Presentation surface to run (chat, server)
    #[arg(long, env = "RUN_MODE", value_enum, default_value_t = RunMode::Chat)]
    pub mode: RunMode,

    // --- Knowledge Args ---
    /// Path to a JSON symptom knowledge file. Uses the built-in table when unset.
    #[arg(long, env = "KNOWLEDGE_PATH")]
    pub knowledge_path: Option<String>,

    // --- Timing Args ---
    /// Artificial delay before the bot reply is appended, in milliseconds.
    #[arg(long, env = "THINKING_DELAY_MS", default_value = "500")]
    pub thinking_delay_ms: u64,

    /// Interval between revealed characters of the latest bot reply, in milliseconds.
    #[arg(long, env = "REVEAL_INTERVAL_MS", default_value = "20")]
    pub reveal_interval_ms: u64,

    // --- Server Args ---
    /// Host address and port for the WebSocket server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Optional HMAC secret. If set, clients must sign the `ts` query parameter and pass it as `sig`.
    #[arg(long, env = "SERVER_API_KEY")]
    pub server_api_key: Option<String>,

    /// Optional port for the HTTP API (health, analyze, knowledge reload).
    #[arg(long, env = "HTTP_PORT")]
    pub http_port: Option<u16>,

    /// Optional path to the TLS certificate file (PEM format) for enabling WSS. Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format) for enabling WSS. Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,

    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,
}

impl Args {
    pub fn thinking_delay(&self) -> Duration {
        Duration::from_millis(self.thinking_delay_ms)
    }

    pub fn reveal_interval(&self) -> Duration {
        Duration::from_millis(self.reveal_interval_ms)
    }

    pub fn tls_enabled(&self) -> bool {
        self.enable_tls && self.tls_cert_path.is_some() && self.tls_key_path.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["symptom-agent"]).unwrap();
        assert_eq!(args.mode, RunMode::Chat);
        assert_eq!(args.thinking_delay(), Duration::from_millis(500));
        assert_eq!(args.reveal_interval(), Duration::from_millis(20));
        assert!(args.knowledge_path.is_none());
        assert!(!args.tls_enabled());
    }

    #[test]
    fn server_mode_flags() {
        let args = Args::try_parse_from([
            "symptom-agent",
            "--mode",
            "server",
            "--http-port",
            "8080",
            "--thinking-delay-ms",
            "0",
        ]).unwrap();
        assert_eq!(args.mode, RunMode::Server);
        assert_eq!(args.http_port, Some(8080));
        assert_eq!(args.thinking_delay(), Duration::ZERO);
    }

    #[test]
    fn rejects_unknown_mode() {
        assert!(Args::try_parse_from(["symptom-agent", "--mode", "gui"]).is_err());
    }
}
