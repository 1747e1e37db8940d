use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::context::SelectionLimits;
use crate::dataset::{DataSource, DataSources};
use crate::llm::GenerationSettings;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub sources: DataSources,
    pub generation: GenerationSettings,
    pub limits: SelectionLimits,
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw)),
        _ => Ok(default),
    }
}

fn string_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

impl AppConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let generation_defaults = GenerationSettings::default();
        let limit_defaults = SelectionLimits::default();

        let timeout_secs = parse_or(
            &lookup,
            "GENERATION_TIMEOUT_SECS",
            generation_defaults.timeout.as_secs(),
        )?;

        Ok(Self {
            bind_addr: parse_or(&lookup, "INSIGHTDESK_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?,
            sources: DataSources {
                report: DataSource::from_location(&string_or(
                    &lookup,
                    "INSIGHTDESK_REPORT",
                    "data/analysis_report.json",
                )),
                sentiment: DataSource::from_location(&string_or(
                    &lookup,
                    "INSIGHTDESK_SENTIMENT",
                    "data/sentiment_by_month.json",
                )),
                interactions: DataSource::from_location(&string_or(
                    &lookup,
                    "INSIGHTDESK_INTERACTIONS",
                    "data/interactions.csv",
                )),
            },
            generation: GenerationSettings {
                base_url: string_or(&lookup, "OLLAMA_URL", &generation_defaults.base_url),
                model: string_or(&lookup, "OLLAMA_MODEL", &generation_defaults.model),
                temperature: parse_or(
                    &lookup,
                    "GENERATION_TEMPERATURE",
                    generation_defaults.temperature,
                )?,
                max_tokens: parse_or(
                    &lookup,
                    "GENERATION_MAX_TOKENS",
                    generation_defaults.max_tokens,
                )?,
                timeout: Duration::from_secs(timeout_secs),
            },
            limits: SelectionLimits {
                max_interactions: parse_or(
                    &lookup,
                    "CONTEXT_MAX_INTERACTIONS",
                    limit_defaults.max_interactions,
                )?,
                recent_periods: parse_or(
                    &lookup,
                    "CONTEXT_RECENT_PERIODS",
                    limit_defaults.recent_periods,
                )?,
            },
        })
    }
}
