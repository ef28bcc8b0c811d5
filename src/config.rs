use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Brute-force protection settings for `/login`.
#[derive(Debug, Clone, Deserialize)]
pub struct ThrottleConfig {
    pub max_failures: u32,
    pub lockout_seconds: i64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_failures: 5,
            lockout_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// `None` runs the server on the in-memory user store.
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub throttle: ThrottleConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());
        let jwt = JwtConfig {
            secret: lookup("JWT_SECRET")
                .ok_or_else(|| anyhow::anyhow!("JWT_SECRET must be set"))?,
            issuer: lookup("JWT_ISSUER").unwrap_or_else(|| "eventhub".into()),
            audience: lookup("JWT_AUDIENCE").unwrap_or_else(|| "eventhub-users".into()),
            ttl_minutes: lookup("JWT_TTL_MINUTES")
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
        };
        let defaults = ThrottleConfig::default();
        let throttle = ThrottleConfig {
            max_failures: lookup("LOGIN_MAX_FAILURES")
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(defaults.max_failures),
            // A non-positive window would disable lockout entirely.
            lockout_seconds: lookup("LOGIN_LOCKOUT_SECONDS")
                .and_then(|v| v.parse::<i64>().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(defaults.lockout_seconds),
        };
        Ok(Self {
            database_url,
            jwt,
            throttle,
        })
    }
}
