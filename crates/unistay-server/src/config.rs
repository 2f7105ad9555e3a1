use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, time::Duration};
use unistay_auth::config::AuthConfig;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Backend API, session, cookie and OAuth configuration
    #[serde(default)]
    pub auth: AuthConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Server validations
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }
        if self.server.wizard_ttl.is_zero() {
            return Err("server.wizard_ttl must be > 0".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        // Auth validation
        self.auth
            .validate()
            .map_err(|e| format!("auth config error: {e}"))?;
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.server.request_timeout_ms as u64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound for a whole request, including backend calls.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u32,
    /// Maximum accepted form body size.
    #[serde(default = "default_body_limit_bytes")]
    pub body_limit_bytes: usize,
    /// How long an abandoned registration wizard is kept.
    #[serde(default = "default_wizard_ttl", with = "humantime_serde")]
    pub wizard_ttl: Duration,
}

fn default_request_timeout_ms() -> u32 {
    30_000
}

fn default_body_limit_bytes() -> usize {
    64 * 1024
}

fn default_wizard_ttl() -> Duration {
    Duration::from_secs(30 * 60)
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            request_timeout_ms: default_request_timeout_ms(),
            body_limit_bytes: default_body_limit_bytes(),
            wizard_ttl: default_wizard_ttl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Default configuration file, relative to the working directory.
    pub const DEFAULT_CONFIG_FILE: &str = "unistay.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., UNISTAY__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("UNISTAY")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        // Validate
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_requires_session_secret() {
        let mut cfg = AppConfig::default();
        let err = cfg.validate().unwrap_err();
        assert!(err.contains("auth.session.secret"), "{err}");

        cfg.auth.session.secret = "server-test-secret-server-test-secret".into();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.addr().port(), 3000);
        assert_eq!(cfg.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_logging_level_rejected() {
        let mut cfg = AppConfig::default();
        cfg.auth.session.secret = "server-test-secret-server-test-secret".into();
        cfg.logging.level = "loud".into();
        let err = cfg.validate().unwrap_err();
        assert!(err.contains("logging.level"));
    }

    #[test]
    fn test_auth_errors_are_prefixed() {
        let mut cfg = AppConfig::default();
        cfg.auth.session.secret = "short".into();
        let err = cfg.validate().unwrap_err();
        assert!(err.starts_with("auth config error"));
    }

    #[test]
    fn test_unparsable_host_falls_back_to_any() {
        let mut cfg = AppConfig::default();
        cfg.server.host = "not-an-ip".into();
        assert!(cfg.addr().ip().is_unspecified());
    }
}
