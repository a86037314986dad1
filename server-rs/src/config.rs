use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub app_base_url: String,
    pub store_backend: StoreBackend,
    pub db: DbConfig,
    pub redis: RedisConfig,
    pub fapshi: FapshiConfig,
    pub registration: RegistrationConfig,
    pub admin: AdminConfig,
    pub rate_limit: RateLimitConfig,
    pub repair: RepairConfig,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Clone, Debug)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub pool_min: u32,
    pub pool_max: u32,
}

#[derive(Clone, Debug)]
pub struct RedisConfig {
    pub url: Option<String>,
    pub key_prefix: String,
    pub stats_ttl_secs: u64,
}

/// Encoding of the webhook signature header value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignatureEncoding {
    Hex,
    Base64,
}

#[derive(Clone, Debug)]
pub struct FapshiConfig {
    pub provider_tag: String,
    pub api_base_url: String,
    pub api_user: Option<String>,
    pub api_key: Option<String>,
    pub user_header: String,
    pub key_header: String,
    pub webhook_secret: Option<String>,
    pub signature_header: String,
    pub signature_encoding: SignatureEncoding,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct RegistrationConfig {
    pub fee_amount: i64,
    pub currency: String,
    pub reference_prefix: String,
    pub success_url: String,
    pub cancel_url: String,
    pub description: String,
}

#[derive(Clone, Debug)]
pub struct AdminConfig {
    pub token: Option<String>,
    pub password: Option<String>,
}

#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub window_secs: u64,
    pub max_requests: u32,
}

#[derive(Clone, Debug)]
pub struct RepairConfig {
    /// Zero disables the sweep.
    pub interval_secs: u64,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn env_or_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        let app_base_url = env_or("APP_BASE_URL", "https://camihn.org")
            .trim_end_matches('/')
            .to_string();

        Self {
            port: env_or_parse("PORT", 3000),
            store_backend: match env_or("STORE_BACKEND", "postgres").to_lowercase().as_str() {
                "memory" => StoreBackend::Memory,
                _ => StoreBackend::Postgres,
            },
            db: DbConfig {
                host: env_or("DB_HOST", "localhost"),
                port: env_or_parse("DB_PORT", 5432),
                database: env_or("DB_NAME", "camihn"),
                user: env_or("DB_USER", "camihn"),
                password: env_or("DB_PASSWORD", ""),
                pool_min: env_or_parse("DB_POOL_MIN", 1),
                pool_max: env_or_parse("DB_POOL_MAX", 10),
            },
            redis: RedisConfig {
                url: env_opt("REDIS_URL").or_else(|| env_opt("KV_URL")),
                key_prefix: "camihn:".to_string(),
                stats_ttl_secs: env_or_parse("ADMIN_STATS_CACHE_SEC", 30),
            },
            fapshi: FapshiConfig {
                provider_tag: "FAPSHI".to_string(),
                api_base_url: env_or("FAPSHI_API_BASE_URL", "https://sandbox.fapshi.com")
                    .trim_end_matches('/')
                    .to_string(),
                api_user: env_opt("FAPSHI_API_USER"),
                api_key: env_opt("FAPSHI_API_KEY"),
                user_header: env_or("FAPSHI_USER_HEADER", "apiuser"),
                key_header: env_or("FAPSHI_KEY_HEADER", "apikey"),
                webhook_secret: env_opt("FAPSHI_WEBHOOK_SECRET"),
                signature_header: env_or("FAPSHI_SIGNATURE_HEADER", "x-fapshi-signature"),
                signature_encoding: match env_or("FAPSHI_SIGNATURE_ENCODING", "hex")
                    .to_lowercase()
                    .as_str()
                {
                    "base64" => SignatureEncoding::Base64,
                    _ => SignatureEncoding::Hex,
                },
                timeout_secs: env_or_parse("FAPSHI_TIMEOUT_SECS", 8u64).max(1),
            },
            registration: RegistrationConfig {
                fee_amount: env_or_parse("REGISTRATION_FEE", 1000),
                currency: env_or("REGISTRATION_CURRENCY", "XAF"),
                reference_prefix: env_or("REGISTRATION_REFERENCE_PREFIX", "CAMIHN"),
                success_url: format!("{}/hackathon/register/success", app_base_url),
                cancel_url: format!("{}/hackathon/register/cancel", app_base_url),
                description: env_or(
                    "REGISTRATION_DESCRIPTION",
                    "CAMIHN Hackathon Team Registration",
                ),
            },
            admin: AdminConfig {
                token: env_opt("HACKATHON_ADMIN_TOKEN"),
                password: env_opt("HACKATHON_ADMIN_PASSWORD"),
            },
            rate_limit: RateLimitConfig {
                window_secs: 60,
                max_requests: env_or_parse("RATE_LIMIT_MAX", 20),
            },
            repair: RepairConfig {
                interval_secs: env_or_parse("REPAIR_INTERVAL_SECS", 300),
            },
            app_base_url,
        }
    }

    pub fn database_url(&self) -> String {
        if let Ok(url) = env::var("DATABASE_URL") {
            return url;
        }
        if let Ok(url) = env::var("POSTGRES_URL") {
            return url;
        }
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.db.user, self.db.password, self.db.host, self.db.port, self.db.database
        )
    }

    /// Link handed to a volunteer so the teams they bring in are attributed to them.
    pub fn registration_link(&self, ref_code: &str) -> String {
        format!("{}/hackathon/register?ref={}", self.app_base_url, ref_code)
    }
}

impl Default for Config {
    /// Development defaults: in-memory store, no provider credentials, no admin secrets.
    fn default() -> Self {
        let app_base_url = "http://localhost:3000".to_string();
        Self {
            port: 3000,
            store_backend: StoreBackend::Memory,
            db: DbConfig {
                host: "localhost".into(),
                port: 5432,
                database: "camihn".into(),
                user: "camihn".into(),
                password: String::new(),
                pool_min: 1,
                pool_max: 10,
            },
            redis: RedisConfig {
                url: None,
                key_prefix: "camihn:".into(),
                stats_ttl_secs: 30,
            },
            fapshi: FapshiConfig {
                provider_tag: "FAPSHI".into(),
                api_base_url: "https://sandbox.fapshi.com".into(),
                api_user: None,
                api_key: None,
                user_header: "apiuser".into(),
                key_header: "apikey".into(),
                webhook_secret: None,
                signature_header: "x-fapshi-signature".into(),
                signature_encoding: SignatureEncoding::Hex,
                timeout_secs: 8,
            },
            registration: RegistrationConfig {
                fee_amount: 1000,
                currency: "XAF".into(),
                reference_prefix: "CAMIHN".into(),
                success_url: format!("{}/hackathon/register/success", app_base_url),
                cancel_url: format!("{}/hackathon/register/cancel", app_base_url),
                description: "CAMIHN Hackathon Team Registration".into(),
            },
            admin: AdminConfig {
                token: None,
                password: None,
            },
            rate_limit: RateLimitConfig {
                window_secs: 60,
                max_requests: 20,
            },
            repair: RepairConfig { interval_secs: 0 },
            app_base_url,
        }
    }
}
