//! # Docker Client Configuration
//!
//! Docker daemon endpoint settings, read from the same variables as the Docker CLI.

use super::{is_truthy, parse_or_default, ConfigError, Environment};
use crate::constants::{DEFAULT_DOCKER_API_VERSION, DEFAULT_DOCKER_HOST, DEFAULT_DOCKER_TIMEOUT_SECS};
use std::path::PathBuf;
use std::time::Duration;

/// Docker daemon connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerConfig {
    /// `DOCKER_HOST`: `unix://`, `tcp://`, `http://` or `https://`
    pub host: String,
    /// `DOCKER_API_VERSION`, used as the `/v{version}` path prefix
    pub api_version: String,
    /// `DOCKER_TLS_VERIFY`: verify the daemon certificate
    ///
    /// When the variable is unset this is on for `https://` hosts and off
    /// otherwise.
    pub tls_verify: bool,
    /// `DOCKER_CERT_PATH`: directory holding `ca.pem`, `cert.pem` and `key.pem`
    pub cert_path: Option<PathBuf>,
    /// `DOCKER_TIMEOUT_SECS`: per-request timeout
    pub timeout_secs: u64,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_DOCKER_HOST.to_string(),
            api_version: DEFAULT_DOCKER_API_VERSION.to_string(),
            tls_verify: false,
            cert_path: None,
            timeout_secs: DEFAULT_DOCKER_TIMEOUT_SECS,
        }
    }
}

/// Resolved daemon endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DockerEndpoint {
    /// Local socket, e.g. `/var/run/docker.sock`
    Unix(PathBuf),
    /// HTTP(S) base URL without trailing slash
    Http {
        base_url: String,
        tls: Option<TlsSettings>,
    },
}

/// TLS material for an HTTPS endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsSettings {
    pub verify: bool,
    pub cert_path: Option<PathBuf>,
}

impl DockerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env(env: &Environment) -> Result<Self, ConfigError> {
        let host = env
            .get("DOCKER_HOST")
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .unwrap_or(DEFAULT_DOCKER_HOST)
            .to_string();

        let api_version = env
            .get("DOCKER_API_VERSION")
            .map(|v| v.trim().trim_start_matches('v').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_DOCKER_API_VERSION.to_string());

        let cert_path = env
            .get("DOCKER_CERT_PATH")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);

        let tls_verify = if env.contains("DOCKER_TLS_VERIFY") {
            is_truthy(env, "DOCKER_TLS_VERIFY")
        } else {
            host.starts_with("https://")
        };

        Ok(Self {
            host,
            api_version,
            tls_verify,
            cert_path,
            timeout_secs: parse_or_default(env, "DOCKER_TIMEOUT_SECS", DEFAULT_DOCKER_TIMEOUT_SECS)?,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Resolve `host` into a connectable endpoint
    ///
    /// `tcp://` becomes `https://` when TLS is requested through
    /// `DOCKER_TLS_VERIFY` or `DOCKER_CERT_PATH`, and `http://` otherwise.
    pub fn endpoint(&self) -> Result<DockerEndpoint, ConfigError> {
        let invalid = |reason: &str| ConfigError::Invalid {
            var: "DOCKER_HOST",
            value: self.host.clone(),
            reason: reason.to_string(),
        };

        let wants_tls = self.tls_verify || self.cert_path.is_some();
        let tls = || TlsSettings {
            verify: self.tls_verify,
            cert_path: self.cert_path.clone(),
        };

        if let Some(path) = self.host.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(invalid("unix socket path is empty"));
            }
            return Ok(DockerEndpoint::Unix(PathBuf::from(path)));
        }

        let (base_url, tls) = if let Some(addr) = self.host.strip_prefix("tcp://") {
            if wants_tls {
                (format!("https://{addr}"), Some(tls()))
            } else {
                (format!("http://{addr}"), None)
            }
        } else if self.host.starts_with("https://") {
            (self.host.clone(), Some(tls()))
        } else if self.host.starts_with("http://") {
            (self.host.clone(), None)
        } else {
            return Err(invalid(
                "expected a unix://, tcp://, http:// or https:// address",
            ));
        };

        let base_url = base_url.trim_end_matches('/').to_string();
        if base_url.ends_with("://") {
            return Err(invalid("host address is empty"));
        }

        Ok(DockerEndpoint::Http { base_url, tls })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_local_socket() {
        let config = DockerConfig::from_env(&Environment::default()).unwrap();
        assert_eq!(config, DockerConfig::default());
        assert_eq!(
            config.endpoint().unwrap(),
            DockerEndpoint::Unix(PathBuf::from("/var/run/docker.sock"))
        );
    }

    #[test]
    fn test_tcp_host_without_tls() {
        let env = Environment::from_vars([("DOCKER_HOST", "tcp://socket-proxy:2375")]);
        let config = DockerConfig::from_env(&env).unwrap();
        assert_eq!(
            config.endpoint().unwrap(),
            DockerEndpoint::Http {
                base_url: "http://socket-proxy:2375".to_string(),
                tls: None,
            }
        );
    }

    #[test]
    fn test_tcp_host_with_tls_verify() {
        let env = Environment::from_vars([
            ("DOCKER_HOST", "tcp://manager:2376"),
            ("DOCKER_TLS_VERIFY", "1"),
            ("DOCKER_CERT_PATH", "/certs"),
            ("DOCKER_API_VERSION", "v1.43"),
        ]);
        let config = DockerConfig::from_env(&env).unwrap();
        assert_eq!(config.api_version, "1.43");
        assert_eq!(
            config.endpoint().unwrap(),
            DockerEndpoint::Http {
                base_url: "https://manager:2376".to_string(),
                tls: Some(TlsSettings {
                    verify: true,
                    cert_path: Some(PathBuf::from("/certs")),
                }),
            }
        );
    }

    #[test]
    fn test_tls_verify_zero_is_off() {
        let env = Environment::from_vars([
            ("DOCKER_HOST", "tcp://manager:2375"),
            ("DOCKER_TLS_VERIFY", "0"),
        ]);
        let config = DockerConfig::from_env(&env).unwrap();
        assert!(!config.tls_verify);
        assert!(matches!(
            config.endpoint().unwrap(),
            DockerEndpoint::Http { tls: None, .. }
        ));
    }

    #[test]
    fn test_https_host_verifies_by_default() {
        let env = Environment::from_vars([("DOCKER_HOST", "https://manager:2376")]);
        let config = DockerConfig::from_env(&env).unwrap();
        assert_eq!(
            config.endpoint().unwrap(),
            DockerEndpoint::Http {
                base_url: "https://manager:2376".to_string(),
                tls: Some(TlsSettings {
                    verify: true,
                    cert_path: None,
                }),
            }
        );
    }

    #[test]
    fn test_https_host_verification_can_be_turned_off() {
        let env = Environment::from_vars([
            ("DOCKER_HOST", "https://manager:2376"),
            ("DOCKER_TLS_VERIFY", "0"),
        ]);
        let config = DockerConfig::from_env(&env).unwrap();
        assert!(matches!(
            config.endpoint().unwrap(),
            DockerEndpoint::Http {
                tls: Some(TlsSettings { verify: false, .. }),
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_unknown_scheme() {
        let env = Environment::from_vars([("DOCKER_HOST", "ssh://manager")]);
        let config = DockerConfig::from_env(&env).unwrap();
        assert!(matches!(
            config.endpoint(),
            Err(ConfigError::Invalid {
                var: "DOCKER_HOST",
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_bad_timeout() {
        let env = Environment::from_vars([("DOCKER_TIMEOUT_SECS", "soon")]);
        assert!(DockerConfig::from_env(&env).is_err());
    }
}
