use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use chrono::Duration;

use crate::workflows::otp::OtpPurpose;

const PLACEHOLDER_SECRET: &str = "replace-this-with-a-long-random-string";

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub debug_mode: bool,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub auth: AuthConfig,
    pub otp: OtpPolicy,
    pub storage: StorageConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let debug_mode = match env::var("APP_DEBUG") {
            Ok(raw) => parse_flag("APP_DEBUG", &raw)?,
            Err(_) => environment != AppEnvironment::Production,
        };

        let secret_key = env::var("AUTH_SECRET_KEY").unwrap_or_else(|_| PLACEHOLDER_SECRET.to_string());
        if environment == AppEnvironment::Production && secret_key == PLACEHOLDER_SECRET {
            return Err(ConfigError::PlaceholderSecret);
        }

        let auth = AuthConfig {
            secret_key,
            access_token_minutes: minutes_var("AUTH_TOKEN_MINUTES", 60)?,
            admin_email: env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@vbudget.local".to_string()),
            admin_password: env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "Admin@123".to_string()),
        };

        let code_length = match env::var("OTP_LENGTH") {
            Ok(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|length| (4..=10).contains(length))
                .ok_or(ConfigError::InvalidNumber { key: "OTP_LENGTH" })?,
            Err(_) => 6,
        };

        let otp = OtpPolicy {
            code_length,
            self_registration_minutes: minutes_var("OTP_SELF_REGISTRATION_MINUTES", 15)?,
            admin_approval_minutes: minutes_var("OTP_ADMIN_APPROVAL_MINUTES", 60)?,
            vendor_unlock_minutes: minutes_var("OTP_VENDOR_UNLOCK_MINUTES", 15)?,
        };

        let storage = StorageConfig {
            uploads_dir: PathBuf::from(
                env::var("UPLOADS_DIR").unwrap_or_else(|_| "./uploads".to_string()),
            ),
        };

        Ok(Self {
            environment,
            debug_mode,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            auth,
            otp,
            storage,
        })
    }
}

/// Upper bound for any configured window: one year.
pub const MAX_WINDOW_MINUTES: i64 = 525_600;

fn minutes_var(key: &'static str, default: i64) -> Result<i64, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|minutes| (1..=MAX_WINDOW_MINUTES).contains(minutes))
            .ok_or(ConfigError::InvalidNumber { key }),
        Err(_) => Ok(default),
    }
}

fn parse_flag(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag { key }),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Token signing material and the bootstrap administrator.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub secret_key: String,
    pub access_token_minutes: i64,
    pub admin_email: String,
    pub admin_password: String,
}

/// Code length and validity windows for one-time passwords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtpPolicy {
    pub code_length: usize,
    pub self_registration_minutes: i64,
    pub admin_approval_minutes: i64,
    pub vendor_unlock_minutes: i64,
}

impl OtpPolicy {
    pub fn validity(&self, purpose: OtpPurpose) -> Duration {
        let minutes = match purpose {
            OtpPurpose::SelfRegistration => self.self_registration_minutes,
            OtpPurpose::AdminApproval => self.admin_approval_minutes,
            OtpPurpose::VendorUnlock => self.vendor_unlock_minutes,
        };
        Duration::try_minutes(minutes).unwrap_or(Duration::MAX)
    }
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self {
            code_length: 6,
            self_registration_minutes: 15,
            admin_approval_minutes: 60,
            vendor_unlock_minutes: 15,
        }
    }
}

/// Where uploaded documents and element sheets are written.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub uploads_dir: PathBuf,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str },
    InvalidFlag { key: &'static str },
    PlaceholderSecret,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key } => {
                write!(f, "{key} must be a positive number in range")
            }
            ConfigError::InvalidFlag { key } => write!(f, "{key} must be true or false"),
            ConfigError::PlaceholderSecret => {
                write!(f, "AUTH_SECRET_KEY must be set when APP_ENV is production")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
