//! Configuration resolution (§6 supplemental): explicit CLI flags, then
//! the documented environment variables, then built-in defaults.
//! Deserializable from an optional on-disk config file too, using named
//! default functions rather than a `Default` impl with inline literals.

use std::path::PathBuf;

use codex_agent_core::DaemonMode;
use serde::{Deserialize, Serialize};

fn default_home() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".codex")
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    4317
}

fn default_transport() -> String {
    "local-cli".to_string()
}

fn default_binary() -> String {
    "codex".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_home")]
    pub home: PathBuf,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_transport")]
    pub transport: String,
    #[serde(default)]
    pub app_server_url: Option<String>,
    #[serde(default = "default_binary")]
    pub binary: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            home: default_home(),
            host: default_host(),
            port: default_port(),
            token: None,
            transport: default_transport(),
            app_server_url: None,
            binary: default_binary(),
        }
    }
}

impl Config {
    fn config_file_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".codex").join("agent-config.json"))
    }

    fn from_file() -> Config {
        Self::config_file_path()
            .and_then(|path| std::fs::read_to_string(path).ok())
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default()
    }

    fn from_env(mut self) -> Self {
        if let Ok(home) = std::env::var("CODEX_HOME") {
            self.home = PathBuf::from(home);
        }
        if let Ok(port) = std::env::var("CODEX_AGENT_PORT") {
            if let Ok(port) = port.parse() {
                self.port = port;
            }
        }
        if let Ok(host) = std::env::var("CODEX_AGENT_HOST") {
            self.host = host;
        }
        if let Ok(token) = std::env::var("CODEX_AGENT_TOKEN") {
            self.token = Some(token);
        }
        if let Ok(transport) = std::env::var("CODEX_AGENT_TRANSPORT") {
            self.transport = transport;
        }
        if let Ok(url) = std::env::var("CODEX_AGENT_APP_SERVER_URL") {
            self.app_server_url = Some(url);
        }
        self
    }

    /// Resolves config-file defaults, then environment overrides, then
    /// whatever the caller applies on top from explicit CLI flags.
    pub fn load() -> Self {
        Self::from_file().from_env()
    }

    pub fn daemon_mode(&self) -> DaemonMode {
        match self.transport.as_str() {
            "app-server" => DaemonMode::AppServer,
            _ => DaemonMode::Http,
        }
    }

    pub fn config_dir(&self) -> PathBuf {
        codex_agent_repo::default_config_dir().unwrap_or_else(|_| self.home.join("agent-config"))
    }

    pub fn daemon_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}
