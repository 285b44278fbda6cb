use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;
use std::time::Duration;

pub const DEFAULT_EXIT_KEYWORDS: &[&str] = &["quit", "exit", "stop", "bye", "thank you"];

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub model_timeout_secs: u64,
    pub session_rps: u32,
    pub max_sessions: usize,
    pub exit_keywords: Vec<String>,
    pub record_feedback: bool,
    pub expose_diagnostics: bool,
    pub google_search: bool,
    pub thinking_budget: i32,
    pub safety_threshold: String,
    pub json_logs: bool,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let exit_keywords = match env::var("EXIT_KEYWORDS") {
            Ok(raw) => parse_keyword_list(&raw),
            Err(_) => DEFAULT_EXIT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        };
        let max_sessions: usize = get_env_parse_or("MAX_SESSIONS", 1000)?;
        if max_sessions == 0 {
            return Err(Error::Config("MAX_SESSIONS must be at least 1".to_string()));
        }
        if exit_keywords.is_empty() {
            return Err(Error::Config(
                "EXIT_KEYWORDS must contain at least one keyword".to_string(),
            ));
        }

        Ok(Self {
            server_address: get_env_or("SERVER_ADDRESS", "0.0.0.0:8080"),
            gemini_api_key: get_env("GEMINI_API_KEY")?,
            gemini_model: get_env_or("GEMINI_MODEL", "gemini-2.5-flash-lite"),
            gemini_base_url: get_env_or(
                "GEMINI_BASE_URL",
                "https://generativelanguage.googleapis.com",
            ),
            model_timeout_secs: get_env_parse_or("MODEL_TIMEOUT_SECS", 60)?,
            session_rps: get_env_parse_or("SESSION_RPS", 20)?,
            max_sessions,
            exit_keywords,
            record_feedback: get_env_parse_or("RECORD_FEEDBACK", false)?,
            expose_diagnostics: get_env_parse_or("EXPOSE_DIAGNOSTICS", false)?,
            google_search: get_env_parse_or("GOOGLE_SEARCH", true)?,
            thinking_budget: get_env_parse_or("THINKING_BUDGET", -1)?,
            safety_threshold: get_env_or("SAFETY_THRESHOLD", "BLOCK_ONLY_HIGH"),
            json_logs: get_env_or("LOG_FORMAT", "text").eq_ignore_ascii_case("json"),
        })
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs.max(1))
    }
}

/// Splits a comma separated list, trimming and lowercasing every entry.
pub fn parse_keyword_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => parse_value(name, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(name: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e)))
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}
