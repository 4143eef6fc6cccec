use serde::Deserialize;

/// Top-level server configuration, loaded from `only_connect.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub web_root: String,
    pub database_url: String,
    pub blob_dir: String,
    pub auth: AuthFileConfig,
    pub limits: LimitsConfig,
    pub rooms: RoomsConfig,
    /// Precompressed brotli/gzip variants + CSS/JS minification + preload
    /// hints (spec.md §6 "Environment"). The server itself doesn't build
    /// these assets; this only controls whether `tower_http::compression`
    /// is layered onto the static file service.
    pub asset_optimization: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            web_root: "web".to_string(),
            database_url: "sqlite://only_connect.db".to_string(),
            blob_dir: "blobs".to_string(),
            auth: AuthFileConfig::default(),
            limits: LimitsConfig::default(),
            rooms: RoomsConfig::default(),
            asset_optimization: false,
        }
    }
}

/// Infrastructure limits (connection caps, buffer sizes, rate limits).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_ws_connections: usize,
    pub socket_send_buffer: usize,
    pub socket_recv_timeout_secs: u64,
    pub socket_heartbeat_secs: u64,
    /// API endpoint rate limit: max burst tokens per IP.
    pub api_rate_limit_burst: usize,
    /// API endpoint rate limit: token refill rate (requests per second) per IP.
    pub api_rate_limit_per_sec: f64,
    /// Maximum concurrent WebSocket connections per IP address.
    pub max_ws_per_ip: usize,
    /// Maximum sockets a single endpoint may hold at once.
    pub max_sockets_per_endpoint: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_ws_connections: 500,
            socket_send_buffer: 64,
            socket_recv_timeout_secs: 3, // spec.md §5: 2.5s, rounded up for the coarse tokio timer
            socket_heartbeat_secs: 1,
            api_rate_limit_burst: 20,
            api_rate_limit_per_sec: 2.0,
            max_ws_per_ip: 20,
            max_sockets_per_endpoint: 32,
        }
    }
}

/// Room lifecycle configuration (spec.md §4.C, §4.D, §4.E).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoomsConfig {
    pub idle_timeout_secs: u64,
    pub idle_check_interval_secs: u64,
    pub selection_pause_ms: u64,
    pub edit_debounce_secs: u64,
    pub edit_save_poll_secs: u64,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: oc_core::room::IDLE_TIMEOUT.as_secs(),
            idle_check_interval_secs: oc_core::room::REAP_INTERVAL.as_secs(),
            selection_pause_ms: oc_core::room::SELECTION_PAUSE.as_millis() as u64,
            edit_debounce_secs: 3,
            edit_save_poll_secs: 5,
        }
    }
}

/// Auth section of the config file. OAuth login against the third-party
/// identity provider is an external collaborator (spec.md §1); this only
/// carries the client credentials the server hands it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthFileConfig {
    pub oauth_client_id: Option<String>,
    pub oauth_client_secret: Option<String>,
    pub tls_cert_path: Option<String>,
    /// Overrides the session cookie name an operator can use to impersonate
    /// an admin session out of band (spec.md §6 "Environment").
    pub admin_session_cookie: Option<String>,
}

impl Default for AuthFileConfig {
    fn default() -> Self {
        Self {
            oauth_client_id: None,
            oauth_client_secret: None,
            tls_cert_path: None,
            admin_session_cookie: None,
        }
    }
}

impl ServerConfig {
    /// Validate configuration, aborting the process on unrecoverable
    /// misconfiguration (spec.md §7: "only unrecoverable startup errors
    /// abort the process").
    pub fn validate(&self) {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            tracing::error!(addr = %self.listen_addr, "listen_addr is not a valid socket address");
            std::process::exit(1);
        }

        if self.auth.oauth_client_secret.is_some() {
            tracing::warn!(
                "oauth_client_secret is set in config file — use ONLY_CONNECT_OAUTH_SECRET env var in production"
            );
        }

        if self.limits.max_ws_connections == 0 {
            tracing::error!("limits.max_ws_connections must be > 0");
            std::process::exit(1);
        }
        if self.limits.socket_send_buffer == 0 {
            tracing::error!("limits.socket_send_buffer must be > 0");
            std::process::exit(1);
        }
        if self.limits.api_rate_limit_per_sec <= 0.0 {
            tracing::error!("limits.api_rate_limit_per_sec must be > 0");
            std::process::exit(1);
        }

        if self.rooms.idle_timeout_secs == 0 {
            tracing::error!("rooms.idle_timeout_secs must be > 0");
            std::process::exit(1);
        }
        if self.rooms.idle_check_interval_secs == 0 {
            tracing::error!("rooms.idle_check_interval_secs must be > 0");
            std::process::exit(1);
        }
        if self.rooms.edit_save_poll_secs == 0 {
            tracing::error!("rooms.edit_save_poll_secs must be > 0");
            std::process::exit(1);
        }
    }

    /// Load config from `only_connect.toml` if it exists, then apply env
    /// var overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("only_connect.toml") {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from only_connect.toml");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse only_connect.toml: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No only_connect.toml found, using defaults");
                ServerConfig::default()
            },
        };

        if let Ok(addr) = std::env::var("ONLY_CONNECT_LISTEN_ADDR")
            && !addr.is_empty()
        {
            config.listen_addr = addr;
        }
        if let Ok(root) = std::env::var("ONLY_CONNECT_WEB_ROOT")
            && !root.is_empty()
        {
            config.web_root = root;
        }
        if let Ok(url) = std::env::var("ONLY_CONNECT_DATABASE_URL")
            && !url.is_empty()
        {
            config.database_url = url;
        }
        if let Ok(dir) = std::env::var("ONLY_CONNECT_BLOB_DIR")
            && !dir.is_empty()
        {
            config.blob_dir = dir;
        }
        if let Ok(id) = std::env::var("ONLY_CONNECT_OAUTH_CLIENT_ID")
            && !id.is_empty()
        {
            config.auth.oauth_client_id = Some(id);
        }
        if let Ok(secret) = std::env::var("ONLY_CONNECT_OAUTH_SECRET")
            && !secret.is_empty()
        {
            config.auth.oauth_client_secret = Some(secret);
        }
        if let Ok(val) = std::env::var("ONLY_CONNECT_MAX_WS_CONNECTIONS")
            && let Ok(n) = val.parse::<usize>()
        {
            config.limits.max_ws_connections = n;
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.listen_addr, "0.0.0.0:8080");
        assert_eq!(cfg.rooms.idle_timeout_secs, 900);
        assert_eq!(cfg.rooms.idle_check_interval_secs, 2);
        assert!(cfg.auth.oauth_client_secret.is_none());
    }

    #[test]
    fn parse_minimal_toml() {
        let toml_str = r#"
listen_addr = "127.0.0.1:9090"
web_root = "/var/www"

[auth]
oauth_client_id = "abc123"
"#;
        let cfg: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.listen_addr, "127.0.0.1:9090");
        assert_eq!(cfg.auth.oauth_client_id.as_deref(), Some("abc123"));
    }

    #[test]
    fn validate_accepts_default_config() {
        ServerConfig::default().validate();
    }

    #[test]
    fn missing_sections_use_defaults() {
        let toml_str = r#"listen_addr = "0.0.0.0:9999""#;
        let cfg: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.limits.max_ws_connections, 500);
        assert_eq!(cfg.rooms.edit_debounce_secs, 3);
    }

    #[test]
    fn parse_limits_and_rooms_toml() {
        let toml_str = r#"
[limits]
max_ws_connections = 1000
max_ws_per_ip = 5

[rooms]
idle_timeout_secs = 120
idle_check_interval_secs = 5
"#;
        let cfg: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.limits.max_ws_connections, 1000);
        assert_eq!(cfg.limits.max_ws_per_ip, 5);
        assert_eq!(cfg.rooms.idle_timeout_secs, 120);
        assert_eq!(cfg.rooms.idle_check_interval_secs, 5);
    }
}
