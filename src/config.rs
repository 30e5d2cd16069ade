use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub access_ttl_hours: i64,
    pub refresh_ttl_hours: i64,
}

/// Account lifecycle knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthPolicy {
    /// New accounts start unverified and must confirm their email before login.
    pub require_email_verification: bool,
    pub verification_ttl_hours: i64,
    pub reset_ttl_minutes: i64,
    pub reset_sweep_interval_secs: u64,
}

/// Argon2id cost parameters used for new hashes.
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub sender_email: String,
    pub sender_name: Option<String>,
    /// Base URL the verification and reset links point at.
    pub public_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminBootstrap {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub jwt: JwtConfig,
    pub auth: AuthPolicy,
    pub password: PasswordConfig,
    pub mail: MailConfig,
    pub admin: Option<AdminBootstrap>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Only `JWT_SECRET` is mandatory.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let secret = get("JWT_SECRET").context("JWT_SECRET must be set to a non-empty value")?;

        let jwt = JwtConfig {
            secret,
            issuer: get("JWT_ISSUER").unwrap_or_else(|| "usermgmt".into()),
            audience: get("JWT_AUDIENCE").unwrap_or_else(|| "usermgmt-clients".into()),
            access_ttl_hours: parse_or(&get, "JWT_ACCESS_TTL_HOURS", 1)?,
            refresh_ttl_hours: parse_or(&get, "JWT_REFRESH_TTL_HOURS", 72)?,
        };
        anyhow::ensure!(jwt.access_ttl_hours > 0, "JWT_ACCESS_TTL_HOURS must be positive");
        anyhow::ensure!(jwt.refresh_ttl_hours > 0, "JWT_REFRESH_TTL_HOURS must be positive");

        let auth = AuthPolicy {
            require_email_verification: parse_or(&get, "REQUIRE_EMAIL_VERIFICATION", false)?,
            verification_ttl_hours: parse_or(&get, "VERIFICATION_TTL_HOURS", 24)?,
            reset_ttl_minutes: parse_or(&get, "RESET_TTL_MINUTES", 60)?,
            reset_sweep_interval_secs: parse_or(&get, "RESET_SWEEP_INTERVAL_SECS", 600)?,
        };
        anyhow::ensure!(auth.verification_ttl_hours > 0, "VERIFICATION_TTL_HOURS must be positive");
        anyhow::ensure!(auth.reset_ttl_minutes > 0, "RESET_TTL_MINUTES must be positive");
        anyhow::ensure!(
            auth.reset_sweep_interval_secs > 0,
            "RESET_SWEEP_INTERVAL_SECS must be positive"
        );

        let password = PasswordConfig {
            memory_kib: parse_or(&get, "PASSWORD_MEMORY_KIB", argon2::Params::DEFAULT_M_COST)?,
            iterations: parse_or(&get, "PASSWORD_ITERATIONS", argon2::Params::DEFAULT_T_COST)?,
            parallelism: parse_or(&get, "PASSWORD_PARALLELISM", argon2::Params::DEFAULT_P_COST)?,
        };

        let mail = MailConfig {
            api_url: get("MAIL_API_URL"),
            api_key: get("MAIL_API_KEY"),
            sender_email: get("MAIL_SENDER_EMAIL").unwrap_or_else(|| "no-reply@localhost".into()),
            sender_name: get("MAIL_SENDER_NAME"),
            public_base_url: get("PUBLIC_BASE_URL")
                .unwrap_or_else(|| "http://localhost:8080".into()),
        };

        let admin = match (get("ADMIN_EMAIL"), get("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminBootstrap {
                email,
                password,
                name: get("ADMIN_NAME").unwrap_or_else(|| "Administrator".into()),
            }),
            _ => None,
        };

        Ok(Self {
            database_url: get("DATABASE_URL"),
            database_max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", 10)?,
            jwt,
            auth,
            password,
            mail,
            admin,
        })
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            database_url: None,
            database_max_connections: 1,
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                access_ttl_hours: 1,
                refresh_ttl_hours: 72,
            },
            auth: AuthPolicy {
                require_email_verification: false,
                verification_ttl_hours: 24,
                reset_ttl_minutes: 60,
                reset_sweep_interval_secs: 600,
            },
            // Cheapest parameters argon2 accepts; keeps the suite fast.
            password: PasswordConfig {
                memory_kib: 8,
                iterations: 1,
                parallelism: 1,
            },
            mail: MailConfig {
                api_url: None,
                api_key: None,
                sender_email: "no-reply@test.local".into(),
                sender_name: None,
                public_base_url: "http://test.local".into(),
            },
            admin: None,
        }
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{key} has invalid value {raw:?}: {e}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_secret_is_fatal() {
        let err = AppConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));

        let err = AppConfig::from_lookup(lookup(&[("JWT_SECRET", "   ")])).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn defaults_apply() {
        let cfg = AppConfig::from_lookup(lookup(&[("JWT_SECRET", "s3cret")])).unwrap();
        assert_eq!(cfg.jwt.secret, "s3cret");
        assert_eq!(cfg.jwt.access_ttl_hours, 1);
        assert_eq!(cfg.jwt.refresh_ttl_hours, 72);
        assert!(!cfg.auth.require_email_verification);
        assert_eq!(cfg.auth.verification_ttl_hours, 24);
        assert_eq!(cfg.auth.reset_ttl_minutes, 60);
        assert!(cfg.database_url.is_none());
        assert!(cfg.admin.is_none());
    }

    #[test]
    fn overrides_and_bad_values() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "s3cret"),
            ("REQUIRE_EMAIL_VERIFICATION", "true"),
            ("JWT_ACCESS_TTL_HOURS", "2"),
            ("ADMIN_EMAIL", "root@x.com"),
            ("ADMIN_PASSWORD", "Adm1n!pass"),
        ]))
        .unwrap();
        assert!(cfg.auth.require_email_verification);
        assert_eq!(cfg.jwt.access_ttl_hours, 2);
        assert_eq!(cfg.admin.unwrap().name, "Administrator");

        let err = AppConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "s3cret"),
            ("JWT_ACCESS_TTL_HOURS", "soon"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("JWT_ACCESS_TTL_HOURS"));

        let err = AppConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "s3cret"),
            ("JWT_REFRESH_TTL_HOURS", "0"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("positive"));
    }
}
