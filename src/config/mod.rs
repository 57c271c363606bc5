use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Which stage of the service this process is running as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration, assembled from the process environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub platform: PlatformConfig,
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

impl AppConfig {
    /// Reads the environment (after loading `.env` when present). Every
    /// setting has a development default, so a bare `gigboard serve`
    /// works out of the box.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::parse(&var_or("GIGBOARD_ENV", "development"));

        let raw_port = var_or("GIGBOARD_PORT", "8080");
        let port = raw_port
            .parse::<u16>()
            .map_err(|_| ConfigError::Port { value: raw_port })?;

        Ok(Self {
            environment,
            server: ServerConfig {
                host: var_or("GIGBOARD_HOST", "127.0.0.1"),
                port,
            },
            telemetry: TelemetryConfig {
                log_level: var_or("GIGBOARD_LOG", "info"),
            },
            platform: PlatformConfig {
                name: var_or("GIGBOARD_PLATFORM_NAME", "Gigboard"),
            },
        })
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
        // "localhost" is accepted as a convenience; everything else must
        // be a literal address.
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self.host.parse().map_err(|source| ConfigError::Host {
            value: self.host.clone(),
            source,
        })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Marketplace identity: the display name system notifications and
/// outbound mail are sent under.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    pub name: String,
}

#[derive(Debug)]
pub enum ConfigError {
    Port { value: String },
    Host {
        value: String,
        source: std::net::AddrParseError,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Port { value } => {
                write!(f, "GIGBOARD_PORT '{value}' is not a port number")
            }
            ConfigError::Host { value, .. } => {
                write!(f, "GIGBOARD_HOST '{value}' is not an IP address")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Port { .. } => None,
            ConfigError::Host { source, .. } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    // process env is shared; serialize the tests that touch it
    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for name in [
            "GIGBOARD_ENV",
            "GIGBOARD_HOST",
            "GIGBOARD_PORT",
            "GIGBOARD_LOG",
            "GIGBOARD_PLATFORM_NAME",
        ] {
            env::remove_var(name);
        }
    }

    #[test]
    fn defaults_cover_a_bare_environment() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.platform.name, "Gigboard");
    }

    #[test]
    fn localhost_resolves_to_loopback() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("GIGBOARD_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 8080));
        env::remove_var("GIGBOARD_HOST");
    }

    #[test]
    fn a_garbled_port_is_refused_with_the_value() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("GIGBOARD_PORT", "harbour");
        let err = AppConfig::load().expect_err("port must not parse");
        assert!(err.to_string().contains("harbour"));
        env::remove_var("GIGBOARD_PORT");
    }

    #[test]
    fn platform_name_comes_from_the_environment() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("GIGBOARD_PLATFORM_NAME", "Verkvangur");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.platform.name, "Verkvangur");
        env::remove_var("GIGBOARD_PLATFORM_NAME");
    }

    #[test]
    fn production_stage_is_recognised() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("GIGBOARD_ENV", "Production");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.environment, AppEnvironment::Production);
        env::remove_var("GIGBOARD_ENV");
    }
}
