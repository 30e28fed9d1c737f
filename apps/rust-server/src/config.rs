// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment once at startup and
//! validated before anything else runs. Invalid auth configuration stops the
//! process.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//! | `AUTH_ENABLED` | Enable the bearer-token gate | `false` |
//! | `OIDC_ISSUER_URL` | OIDC issuer | Required when auth is enabled |
//! | `OIDC_AUDIENCE` | Expected token audience | Required when auth is enabled |
//! | `OIDC_SKIP_EXPIRY_CHECK` | Do not check `exp`/`nbf` (insecure) | `false` |
//! | `OIDC_SKIP_CLIENT_ID_CHECK` | Do not check `aud` (insecure) | `false` |
//! | `OIDC_SKIP_ISSUER_CHECK` | Do not check `iss` (insecure) | `false` |
//! | `OIDC_ALLOW_INSECURE_ISSUER` | Accept an `http://` issuer (development only) | `false` |
//! | `AUTH_PUBLIC_PATHS` | Comma-separated paths exempt from auth | `/health/*,/metrics` |
//! | `AUTH_REQUIRED_ROLE` | Comma-separated roles, any one required | empty |
//! | `AUTH_REQUIRED_PERMISSION` | Comma-separated permissions, all required | empty |
//! | `AUTH_REQUIRED_SCOPE` | Comma-separated scopes, any one required | empty |
//! | `AUTH_VERIFY_TIMEOUT_SECS` | Upper bound on one token verification, in seconds (> 0) | `10` |

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::time::Duration;

use url::Url;

use crate::auth::{AccessPolicy, AuthPolicy, InsecureChecks, PublicPaths, VerificationChecks};
use crate::logging::LogFormat;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";
pub const AUTH_ENABLED_ENV: &str = "AUTH_ENABLED";
pub const OIDC_ISSUER_URL_ENV: &str = "OIDC_ISSUER_URL";
pub const OIDC_AUDIENCE_ENV: &str = "OIDC_AUDIENCE";
pub const OIDC_SKIP_EXPIRY_CHECK_ENV: &str = "OIDC_SKIP_EXPIRY_CHECK";
pub const OIDC_SKIP_CLIENT_ID_CHECK_ENV: &str = "OIDC_SKIP_CLIENT_ID_CHECK";
pub const OIDC_SKIP_ISSUER_CHECK_ENV: &str = "OIDC_SKIP_ISSUER_CHECK";
pub const OIDC_ALLOW_INSECURE_ISSUER_ENV: &str = "OIDC_ALLOW_INSECURE_ISSUER";
pub const AUTH_PUBLIC_PATHS_ENV: &str = "AUTH_PUBLIC_PATHS";
pub const AUTH_REQUIRED_ROLE_ENV: &str = "AUTH_REQUIRED_ROLE";
pub const AUTH_REQUIRED_PERMISSION_ENV: &str = "AUTH_REQUIRED_PERMISSION";
pub const AUTH_REQUIRED_SCOPE_ENV: &str = "AUTH_REQUIRED_SCOPE";
pub const AUTH_VERIFY_TIMEOUT_SECS_ENV: &str = "AUTH_VERIFY_TIMEOUT_SECS";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_PUBLIC_PATHS: &str = "/health/*,/metrics";
const DEFAULT_VERIFY_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} is required when AUTH_ENABLED=true")]
    Missing { var: &'static str },
    #[error("{var} has invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Validated process configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub log_format: LogFormat,
    pub auth: AuthPolicy,
    pub verify_timeout: Duration,
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let host = env.string(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = env.parse(PORT_ENV, DEFAULT_PORT)?;
        let bind_addr = format!("{host}:{port}")
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                var: HOST_ENV,
                value: host.clone(),
                reason: e.to_string(),
            })?;

        let log_format = match env.string(LOG_FORMAT_ENV) {
            None => LogFormat::Pretty,
            Some(value) => value.parse().map_err(|reason| ConfigError::Invalid {
                var: LOG_FORMAT_ENV,
                value,
                reason,
            })?,
        };

        let verify_timeout_secs: u64 =
            env.parse(AUTH_VERIFY_TIMEOUT_SECS_ENV, DEFAULT_VERIFY_TIMEOUT_SECS)?;
        if verify_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                var: AUTH_VERIFY_TIMEOUT_SECS_ENV,
                value: verify_timeout_secs.to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        let verify_timeout = Duration::from_secs(verify_timeout_secs);

        Ok(Self {
            bind_addr,
            log_format,
            auth: auth_policy(&env)?,
            verify_timeout,
        })
    }
}

fn auth_policy<F>(env: &Env<F>) -> Result<AuthPolicy, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let enabled = env.flag(AUTH_ENABLED_ENV)?;

    let public_paths = PublicPaths::new(
        env.string(AUTH_PUBLIC_PATHS_ENV)
            .unwrap_or_else(|| DEFAULT_PUBLIC_PATHS.to_string())
            .split(','),
    );

    let access = AccessPolicy {
        required_roles: env.list(AUTH_REQUIRED_ROLE_ENV),
        required_permissions: env.list(AUTH_REQUIRED_PERMISSION_ENV),
        required_scopes: env.list(AUTH_REQUIRED_SCOPE_ENV),
    };

    let relax = InsecureChecks {
        skip_expiry: env.flag(OIDC_SKIP_EXPIRY_CHECK_ENV)?,
        skip_audience: env.flag(OIDC_SKIP_CLIENT_ID_CHECK_ENV)?,
        skip_issuer: env.flag(OIDC_SKIP_ISSUER_CHECK_ENV)?,
    };

    if !enabled {
        let mut policy = AuthPolicy::disabled();
        policy.access = access;
        policy.public_paths = public_paths;
        return Ok(policy);
    }

    let issuer_url = env.string(OIDC_ISSUER_URL_ENV).ok_or(ConfigError::Missing {
        var: OIDC_ISSUER_URL_ENV,
    })?;
    let audience = env.string(OIDC_AUDIENCE_ENV).ok_or(ConfigError::Missing {
        var: OIDC_AUDIENCE_ENV,
    })?;
    validate_issuer(&issuer_url, env.flag(OIDC_ALLOW_INSECURE_ISSUER_ENV)?)?;

    let checks = if relax == InsecureChecks::default() {
        VerificationChecks::strict()
    } else {
        VerificationChecks::insecure(relax)
    };

    Ok(AuthPolicy {
        enabled,
        issuer_url,
        audience,
        checks,
        access,
        public_paths,
    })
}

fn validate_issuer(issuer_url: &str, allow_insecure: bool) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        var: OIDC_ISSUER_URL_ENV,
        value: issuer_url.to_string(),
        reason,
    };

    let url = Url::parse(issuer_url).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "https" => Ok(()),
        "http" if allow_insecure => {
            tracing::warn!(
                issuer = issuer_url,
                "SECURITY: using a non-TLS OIDC issuer ({OIDC_ALLOW_INSECURE_ISSUER_ENV}=true)"
            );
            Ok(())
        }
        "http" => Err(invalid(format!(
            "issuer must use https (set {OIDC_ALLOW_INSECURE_ISSUER_ENV}=true for development)"
        ))),
        other => Err(invalid(format!("unsupported scheme '{other}'"))),
    }
}

/// Typed access to environment variables.
struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Non-blank, trimmed value.
    fn string(&self, var: &str) -> Option<String> {
        (self.0)(var)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T>(&self, var: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.string(var) {
            None => Ok(default),
            Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
                var,
                reason: e.to_string(),
                value,
            }),
        }
    }

    fn flag(&self, var: &'static str) -> Result<bool, ConfigError> {
        match self.string(var) {
            None => Ok(false),
            Some(value) => parse_bool(&value).ok_or_else(|| ConfigError::Invalid {
                var,
                value,
                reason: "expected a boolean".to_string(),
            }),
        }
    }

    fn list(&self, var: &str) -> BTreeSet<String> {
        self.string(var)
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "yes" | "on" => Some(true),
        "0" | "f" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::PathPattern;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|var| vars.get(var).cloned())
    }

    const ENABLED: &[(&str, &str)] = &[
        ("AUTH_ENABLED", "true"),
        ("OIDC_ISSUER_URL", "https://idp.example.com/realms/timeloc"),
        ("OIDC_AUDIENCE", "timeloc-api"),
    ];

    #[test]
    fn defaults_disable_auth() {
        let config = load(&[]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(!config.auth.enabled);
        assert_eq!(config.verify_timeout, Duration::from_secs(10));
        assert_eq!(
            config.auth.public_paths.patterns(),
            &[
                PathPattern::Prefix("/health".to_string()),
                PathPattern::Exact("/metrics".to_string()),
            ]
        );
    }

    #[test]
    fn enabled_auth_requires_issuer_and_audience() {
        assert!(matches!(
            load(&[("AUTH_ENABLED", "true")]),
            Err(ConfigError::Missing { var: "OIDC_ISSUER_URL" })
        ));
        assert!(matches!(
            load(&[("AUTH_ENABLED", "1"), ("OIDC_ISSUER_URL", "https://idp.example.com")]),
            Err(ConfigError::Missing { var: "OIDC_AUDIENCE" })
        ));
    }

    #[test]
    fn enabled_auth_builds_strict_policy() {
        let mut vars = ENABLED.to_vec();
        vars.push(("AUTH_REQUIRED_ROLE", "admin, operator"));
        vars.push(("AUTH_REQUIRED_PERMISSION", "locations:read"));
        vars.push(("AUTH_REQUIRED_SCOPE", "time:read"));
        vars.push(("AUTH_PUBLIC_PATHS", "/health,/docs/*"));

        let auth = load(&vars).unwrap().auth;
        assert!(auth.enabled);
        assert!(auth.checks.is_strict());
        assert_eq!(auth.audience, "timeloc-api");
        assert_eq!(auth.access.required_roles.len(), 2);
        assert!(auth.access.required_roles.contains("operator"));
        assert!(auth.access.required_permissions.contains("locations:read"));
        assert!(auth.access.required_scopes.contains("time:read"));
        assert!(auth.public_paths.is_public("/docs/index.html"));
        assert!(!auth.public_paths.is_public("/metrics"));
    }

    #[test]
    fn http_issuer_needs_explicit_override() {
        let vars = [
            ("AUTH_ENABLED", "true"),
            ("OIDC_ISSUER_URL", "http://localhost:8180/realms/dev"),
            ("OIDC_AUDIENCE", "timeloc-api"),
        ];
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Invalid { var: "OIDC_ISSUER_URL", .. })
        ));

        let mut vars = vars.to_vec();
        vars.push(("OIDC_ALLOW_INSECURE_ISSUER", "true"));
        assert!(load(&vars).is_ok());
    }

    #[test]
    fn malformed_issuer_is_rejected() {
        let vars = [
            ("AUTH_ENABLED", "true"),
            ("OIDC_ISSUER_URL", "idp.example.com"),
            ("OIDC_AUDIENCE", "timeloc-api"),
        ];
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Invalid { var: "OIDC_ISSUER_URL", .. })
        ));
    }

    #[test]
    fn skip_flags_relax_checks() {
        let mut vars = ENABLED.to_vec();
        vars.push(("OIDC_SKIP_CLIENT_ID_CHECK", "TRUE"));
        vars.push(("OIDC_SKIP_EXPIRY_CHECK", "false"));

        let checks = load(&vars).unwrap().auth.checks;
        assert!(!checks.audience());
        assert!(checks.expiry());
        assert!(checks.issuer());
    }

    #[test]
    fn invalid_values_are_errors() {
        assert!(matches!(
            load(&[("AUTH_ENABLED", "maybe")]),
            Err(ConfigError::Invalid { var: "AUTH_ENABLED", .. })
        ));
        assert!(matches!(
            load(&[("PORT", "eighty")]),
            Err(ConfigError::Invalid { var: "PORT", .. })
        ));
        assert!(matches!(
            load(&[("LOG_FORMAT", "xml")]),
            Err(ConfigError::Invalid { var: "LOG_FORMAT", .. })
        ));
    }

    #[test]
    fn zero_verify_timeout_is_rejected() {
        assert!(matches!(
            load(&[("AUTH_VERIFY_TIMEOUT_SECS", "0")]),
            Err(ConfigError::Invalid { var: "AUTH_VERIFY_TIMEOUT_SECS", .. })
        ));
        let config = load(&[("AUTH_VERIFY_TIMEOUT_SECS", "2")]).unwrap();
        assert_eq!(config.verify_timeout, Duration::from_secs(2));
    }
}
