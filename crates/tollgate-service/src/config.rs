//! Service configuration.

use serde::Deserialize;
use std::path::Path;

/// Default session cookie name.
pub const DEFAULT_SESSION_COOKIE: &str = "tollgate_session";

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// PostgreSQL connection string. When unset the in-memory store is used.
    pub database_url: Option<String>,

    /// HS256 secret for session JWTs. Session auth is disabled without it.
    pub session_secret: Option<String>,

    /// Name of the cookie carrying the session JWT.
    pub session_cookie: String,

    /// Admin key expected in `x-admin-key`.
    pub admin_api_key: Option<String>,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Timeout for a single outgoing webhook delivery, in seconds.
    pub webhook_timeout_seconds: u64,
}

/// Auth secrets file structure.
#[derive(Debug, Deserialize)]
struct AuthSecrets {
    #[serde(default)]
    session_secret: Option<String>,
    #[serde(default)]
    admin_api_key: Option<String>,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    #[must_use]
    pub fn from_env() -> Self {
        let (session_secret, admin_api_key) = load_auth_secrets();

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            database_url: std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            session_secret,
            session_cookie: std::env::var("SESSION_COOKIE")
                .unwrap_or_else(|_| DEFAULT_SESSION_COOKIE.into()),
            admin_api_key,
            cors_origins: parse_origins(
                &std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".into()),
            ),
            max_body_bytes: env_parse("MAX_BODY_BYTES").unwrap_or(1024 * 1024), // 1MB
            request_timeout_seconds: env_parse("REQUEST_TIMEOUT_SECONDS").unwrap_or(30),
            webhook_timeout_seconds: env_parse("WEBHOOK_TIMEOUT_SECONDS").unwrap_or(10),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Load auth secrets from file or environment.
///
/// Values present in the file win; missing ones fall back to
/// `SESSION_SECRET` / `ADMIN_API_KEY`.
fn load_auth_secrets() -> (Option<String>, Option<String>) {
    let secret_paths = [
        ".secrets/auth.json",
        "tollgate/.secrets/auth.json",
        "../.secrets/auth.json",
    ];

    let from_file = secret_paths.iter().find_map(|path| {
        load_secrets_file::<AuthSecrets>(path).ok().map(|secrets| {
            tracing::info!(path = %path, "Loaded auth secrets from file");
            secrets
        })
    });

    if from_file.is_none() {
        tracing::debug!("Auth secrets file not found, using environment variables");
    }

    let (file_session, file_admin) = from_file
        .map(|s| (s.session_secret, s.admin_api_key))
        .unwrap_or_default();

    (
        file_session.or_else(|| std::env::var("SESSION_SECRET").ok()),
        file_admin.or_else(|| std::env::var("ADMIN_API_KEY").ok()),
    )
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            database_url: None,
            session_secret: None,
            session_cookie: DEFAULT_SESSION_COOKIE.into(),
            admin_api_key: None,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            webhook_timeout_seconds: 10,
        }
    }
}
