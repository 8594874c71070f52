use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_SOURCE_URL: &str = "https://www.jovemprogramador.com.br/";
const DEFAULT_CACHE_PATH: &str = "dados.txt";
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://127.0.0.1:5500";

#[derive(Debug, Clone)]
pub struct QaConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub mode: ServiceMode,
    pub google: GoogleConfig,
    pub context: ContextConfig,
    /// Present only in [`ServiceMode::Logging`].
    pub database: Option<DatabaseConfig>,
    pub security: SecurityConfig,
}

/// Which flavour of the service to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceMode {
    /// Answers only, any origin may call.
    Minimal,
    /// Answers plus a persisted question log and an origin allow-list.
    Logging,
}

impl ServiceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceMode::Minimal => "minimal",
            ServiceMode::Logging => "logging",
        }
    }
}

impl FromStr for ServiceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "minimal" => Ok(ServiceMode::Minimal),
            "logging" => Ok(ServiceMode::Logging),
            other => Err(format!(
                "Invalid QA_MODE '{}': expected 'minimal' or 'logging'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub api_key: Secret<String>,
    pub model: String,
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct ContextConfig {
    pub source_url: String,
    pub cache_path: PathBuf,
    pub fetch_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// Used only in logging mode; minimal mode allows any origin.
    pub allowed_origins: Vec<String>,
}

impl QaConfig {
    pub fn load() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        Self::from_lookup(common, |key| env::var(key).ok())
    }

    /// Build the service settings from an arbitrary key lookup.
    pub fn from_lookup<F>(common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars {
            lookup,
            is_prod: false,
        };
        let is_prod = vars.get("ENVIRONMENT", Some("dev"))? == "prod";
        let vars = Vars { is_prod, ..vars };

        let mode: ServiceMode = vars
            .get("QA_MODE", Some("minimal"))?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let database = match mode {
            ServiceMode::Minimal => None,
            ServiceMode::Logging => Some(DatabaseConfig {
                url: Secret::new(vars.get("DATABASE_URL", None)?),
                max_connections: vars.parse("DATABASE_MAX_CONNECTIONS", 5)?,
            }),
        };

        let allowed_origins: Vec<String> = vars
            .get("QA_ALLOWED_ORIGINS", Some(DEFAULT_ALLOWED_ORIGINS))?
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();

        // Credentialed CORS cannot be combined with a wildcard origin.
        if mode == ServiceMode::Logging && allowed_origins.iter().any(|o| o == "*") {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "QA_ALLOWED_ORIGINS must list explicit origins in logging mode, not '*'"
            )));
        }

        Ok(QaConfig {
            common,
            service_name: vars.get("SERVICE_NAME", Some("qa-service"))?,
            log_level: vars.get("LOG_LEVEL", Some("info"))?,
            otlp_endpoint: (vars.lookup)("OTLP_ENDPOINT").filter(|v| !v.is_empty()),
            mode,
            google: GoogleConfig {
                api_key: Secret::new(vars.get("GEMINI_API_KEY", None)?),
                model: vars.get("GEMINI_MODEL", Some("gemini-2.0-flash"))?,
                api_base: vars.get("GEMINI_API_BASE", Some(DEFAULT_GEMINI_API_BASE))?,
            },
            context: ContextConfig::from_vars(&vars)?,
            database,
            security: SecurityConfig {
                allowed_origins,
            },
        })
    }
}

impl ContextConfig {
    /// Context settings alone, for tools that never call the model or the
    /// database.
    pub fn load() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_vars(&Vars {
            lookup,
            is_prod: false,
        })
    }

    fn from_vars<F>(vars: &Vars<F>) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(ContextConfig {
            source_url: vars.get("CONTEXT_SOURCE_URL", Some(DEFAULT_SOURCE_URL))?,
            cache_path: PathBuf::from(vars.get("CONTEXT_CACHE_PATH", Some(DEFAULT_CACHE_PATH))?),
            fetch_timeout_secs: vars
                .parse("CONTEXT_FETCH_TIMEOUT_SECS", DEFAULT_FETCH_TIMEOUT_SECS)?,
        })
    }
}

struct Vars<F> {
    lookup: F,
    is_prod: bool,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Empty values count as unset. Keys without a default are required.
    fn get(&self, key: &str, default: Option<&str>) -> Result<String, AppError> {
        match (self.lookup)(key).filter(|v| !v.is_empty()) {
            Some(val) => Ok(val),
            None => match default {
                Some(def) => Ok(def.to_string()),
                None if self.is_prod => Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                ))),
                None => Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                ))),
            },
        }
    }

    fn parse<T>(&self, key: &str, default: T) -> Result<T, AppError>
    where
        T: FromStr + ToString,
        T::Err: std::fmt::Display,
    {
        self.get(key, Some(&default.to_string()))?
            .parse()
            .map_err(|e: T::Err| {
                AppError::ConfigError(anyhow::anyhow!("{} has an invalid value: {}", key, e))
            })
    }
}
