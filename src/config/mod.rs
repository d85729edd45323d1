use anyhow::{Context, Result};
use rand::Rng;
use serde::Deserialize;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::auth::TokenSettings;
use crate::db::UserRole;

pub const ACCESS_SECRET_ENV: &str = "ATELIER_ACCESS_SECRET";
pub const REFRESH_SECRET_ENV: &str = "ATELIER_REFRESH_SECRET";
pub const RESET_SECRET_ENV: &str = "ATELIER_RESET_SECRET";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Secrets that were missing and got a random per-process value
    #[serde(skip)]
    pub generated_secrets: Vec<&'static str>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Origins allowed to call the API from a browser. Empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Reverse proxies whose X-Forwarded-For / X-Real-IP headers are believed.
    /// Requests from any other peer are keyed by their socket address.
    #[serde(default)]
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
            cors_origins: Vec::new(),
            trusted_proxies: Vec::new(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for access tokens
    pub access_secret: Option<String>,
    /// HMAC secret for refresh tokens
    pub refresh_secret: Option<String>,
    /// HMAC secret for password reset tokens
    pub reset_secret: Option<String>,
    #[serde(default = "default_issuer")]
    pub issuer: String,
    #[serde(default = "default_audience")]
    pub audience: String,
    /// Access token lifetime in seconds (default: 15 minutes)
    #[serde(default = "default_access_token_ttl")]
    pub access_token_ttl: u64,
    /// Refresh token lifetime in seconds (default: 7 days)
    #[serde(default = "default_refresh_token_ttl")]
    pub refresh_token_ttl: u64,
    /// Reset token lifetime in seconds (default: 1 hour)
    #[serde(default = "default_reset_token_ttl")]
    pub reset_token_ttl: u64,
    /// Role given to accounts created through public registration
    #[serde(default = "default_role")]
    pub default_role: UserRole,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_secret: None,
            refresh_secret: None,
            reset_secret: None,
            issuer: default_issuer(),
            audience: default_audience(),
            access_token_ttl: default_access_token_ttl(),
            refresh_token_ttl: default_refresh_token_ttl(),
            reset_token_ttl: default_reset_token_ttl(),
            default_role: default_role(),
        }
    }
}

fn default_issuer() -> String {
    "atelier".to_string()
}

fn default_audience() -> String {
    "atelier-web".to_string()
}

fn default_access_token_ttl() -> u64 {
    15 * 60
}

fn default_refresh_token_ttl() -> u64 {
    7 * 24 * 60 * 60
}

fn default_reset_token_ttl() -> u64 {
    60 * 60
}

fn default_role() -> UserRole {
    UserRole::Admin
}

/// Random 256-bit hex secret
fn generate_secret() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    hex::encode(bytes)
}

impl AuthConfig {
    /// Fill in missing secrets with random per-process values. Returns the
    /// names of the secrets that had to be generated.
    fn fill_missing_secrets(&mut self) -> Vec<&'static str> {
        let mut generated = Vec::new();
        for (name, slot) in [
            ("access_secret", &mut self.access_secret),
            ("refresh_secret", &mut self.refresh_secret),
            ("reset_secret", &mut self.reset_secret),
        ] {
            if slot.as_deref().map_or(true, str::is_empty) {
                *slot = Some(generate_secret());
                generated.push(name);
            }
        }
        generated
    }

    fn secrets_are_distinct(&self) -> bool {
        self.access_secret != self.refresh_secret
            && self.access_secret != self.reset_secret
            && self.refresh_secret != self.reset_secret
    }

    pub fn token_settings(&self) -> TokenSettings {
        let secret = |s: &Option<String>| s.clone().unwrap_or_else(generate_secret);
        TokenSettings {
            access_secret: secret(&self.access_secret),
            refresh_secret: secret(&self.refresh_secret),
            reset_secret: secret(&self.reset_secret),
            issuer: self.issuer.clone(),
            audience: self.audience.clone(),
            access_ttl: seconds(self.access_token_ttl),
            refresh_ttl: seconds(self.refresh_token_ttl),
            reset_ttl: seconds(self.reset_token_ttl),
        }
    }
}

fn seconds(secs: u64) -> chrono::Duration {
    // Capped at ten years so `now + ttl` cannot overflow
    const MAX_TTL: i64 = 10 * 365 * 24 * 60 * 60;
    chrono::Duration::seconds(i64::try_from(secs).unwrap_or(MAX_TTL).min(MAX_TTL))
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Requests per window for general API endpoints
    #[serde(default = "default_api_requests")]
    pub api_requests_per_window: u32,
    /// Requests per window for login/register/refresh/password endpoints
    #[serde(default = "default_auth_requests")]
    pub auth_requests_per_window: u32,
    /// Requests per window for the public contact and booking forms
    #[serde(default = "default_form_requests")]
    pub form_requests_per_window: u32,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
    /// Seconds between sweeps of stale limiter entries
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_requests_per_window: default_api_requests(),
            auth_requests_per_window: default_auth_requests(),
            form_requests_per_window: default_form_requests(),
            window_seconds: default_window_seconds(),
            cleanup_interval: default_cleanup_interval(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_api_requests() -> u32 {
    100
}

fn default_auth_requests() -> u32 {
    20
}

fn default_form_requests() -> u32 {
    10
}

fn default_window_seconds() -> u64 {
    60
}

fn default_cleanup_interval() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            rate_limit: RateLimitConfig::default(),
            logging: LoggingConfig::default(),
            generated_secrets: Vec::new(),
        }
    }
}

impl Config {
    /// Read the configuration file if present, apply environment overrides
    /// and fill in any missing token secrets.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Self::read(path)?;
        config.apply_env_overrides();
        config.finalize();
        Ok(config)
    }

    /// Parse the file (or fall back to defaults) without touching secrets
    pub fn read(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::parse(&content)
        } else {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse configuration file")
    }

    fn apply_env_overrides(&mut self) {
        let read = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        if let Some(secret) = read(ACCESS_SECRET_ENV) {
            self.auth.access_secret = Some(secret);
        }
        if let Some(secret) = read(REFRESH_SECRET_ENV) {
            self.auth.refresh_secret = Some(secret);
        }
        if let Some(secret) = read(RESET_SECRET_ENV) {
            self.auth.reset_secret = Some(secret);
        }
    }

    /// Runs before logging is set up, so anything worth reporting goes
    /// through `warnings()`.
    fn finalize(&mut self) {
        self.generated_secrets = self.auth.fill_missing_secrets();
    }

    /// Human-readable problems worth surfacing before the server starts
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if !self.generated_secrets.is_empty() {
            warnings.push(format!(
                "Token secrets not configured ({}) - generated random ones; tokens will not survive a restart",
                self.generated_secrets.join(", ")
            ));
        } else if self.auth.access_secret.is_none()
            || self.auth.refresh_secret.is_none()
            || self.auth.reset_secret.is_none()
        {
            warnings.push(
                "Not all token secrets are set - random secrets will be generated at startup"
                    .to_string(),
            );
        }

        if self.auth.access_secret.is_some() && !self.auth.secrets_are_distinct() {
            warnings.push(
                "Token secrets are shared between token kinds - use a distinct secret per kind"
                    .to_string(),
            );
        }

        if self.auth.default_role.is_admin() {
            warnings.push(
                "auth.default_role is \"admin\" - every public registration gets admin access"
                    .to_string(),
            );
        }

        if !self.rate_limit.enabled {
            warnings.push("Rate limiting is disabled".to_string());
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.access_token_ttl, 900);
        assert_eq!(config.auth.refresh_token_ttl, 604_800);
        assert_eq!(config.auth.reset_token_ttl, 3600);
        assert_eq!(config.auth.default_role, UserRole::Admin);
        assert!(config.rate_limit.enabled);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_partial_file() {
        let config = Config::parse(
            r#"
            [server]
            port = 3000

            [auth]
            access_secret = "a"
            refresh_secret = "b"
            reset_secret = "c"
            default_role = "user"
            access_token_ttl = 60
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.auth.default_role, UserRole::User);
        assert_eq!(config.auth.access_token_ttl, 60);
        assert_eq!(config.auth.refresh_token_ttl, 604_800);
        assert!(config.auth.secrets_are_distinct());
    }

    #[test]
    fn test_invalid_role_rejected() {
        assert!(Config::parse("[auth]\ndefault_role = \"root\"").is_err());
    }

    #[test]
    fn test_missing_secrets_are_generated_distinct() {
        let mut config = Config::default();
        config.finalize();

        assert!(config.auth.access_secret.is_some());
        assert_eq!(config.auth.access_secret.as_ref().unwrap().len(), 64);
        assert!(config.auth.secrets_are_distinct());
        assert_eq!(
            config.generated_secrets,
            vec!["access_secret", "refresh_secret", "reset_secret"]
        );
    }

    #[test]
    fn test_load_without_file_reports_generated_secrets() {
        let config = Config::load(Path::new("/nonexistent/atelier.toml")).unwrap();

        let warnings = config.warnings();
        assert!(
            warnings.iter().any(|w| w.contains("Token secrets not configured")),
            "warnings: {:?}",
            warnings
        );
    }

    #[test]
    fn test_fully_configured_secrets_do_not_warn() {
        let mut config = Config::parse(
            "[auth]\naccess_secret = \"a\"\nrefresh_secret = \"b\"\nreset_secret = \"c\"",
        )
        .unwrap();
        config.finalize();

        assert!(config.generated_secrets.is_empty());
        assert!(!config.warnings().iter().any(|w| w.contains("secret")));
    }

    #[test]
    fn test_trusted_proxies_parsed() {
        let config = Config::parse("[server]\ntrusted_proxies = [\"10.0.0.1\", \"::1\"]").unwrap();
        assert_eq!(config.server.trusted_proxies.len(), 2);
        assert!(Config::parse("[server]\ntrusted_proxies = [\"not-an-ip\"]").is_err());
    }

    #[test]
    fn test_configured_secrets_kept() {
        let mut config = Config::parse("[auth]\naccess_secret = \"keep-me\"").unwrap();
        let generated = config.auth.fill_missing_secrets();

        assert_eq!(config.auth.access_secret.as_deref(), Some("keep-me"));
        assert_eq!(generated, vec!["refresh_secret", "reset_secret"]);
    }

    #[test]
    fn test_token_settings_durations() {
        let settings = AuthConfig::default().token_settings();
        assert_eq!(settings.access_ttl.num_minutes(), 15);
        assert_eq!(settings.refresh_ttl.num_days(), 7);
        assert_eq!(settings.reset_ttl.num_hours(), 1);
    }

    #[test]
    fn test_admin_default_role_warns() {
        let config = Config::default();
        assert!(config.warnings().iter().any(|w| w.contains("default_role")));
    }
}
