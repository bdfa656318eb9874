use std::{collections::HashMap, fs};

use anyhow::Context;
use serde::Deserialize;
use url::Url;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub endpoint_url: String,
    pub request_timeout_seconds: u64,
    pub max_new_tokens: Option<u32>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint_url: "http://127.0.0.1:8000".into(),
            // Inference can take a while on CPU-only deployments.
            request_timeout_seconds: 120,
            max_new_tokens: None,
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("analyzer.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("endpoint_url") {
                settings.endpoint_url = v.clone();
            }
            if let Some(v) = file_cfg.get("request_timeout_seconds") {
                if let Ok(parsed) = v.parse::<u64>() {
                    settings.request_timeout_seconds = parsed;
                }
            }
            if let Some(v) = file_cfg.get("max_new_tokens") {
                if let Ok(parsed) = v.parse::<u32>() {
                    settings.max_new_tokens = Some(parsed);
                }
            }
        }
    }

    if let Ok(v) = std::env::var("ANALYZER_ENDPOINT") {
        settings.endpoint_url = v;
    }
    if let Ok(v) = std::env::var("APP__ENDPOINT_URL") {
        settings.endpoint_url = v;
    }

    if let Ok(v) = std::env::var("APP__REQUEST_TIMEOUT_SECONDS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_seconds = parsed;
        }
    }

    if let Ok(v) = std::env::var("APP__MAX_NEW_TOKENS") {
        if let Ok(parsed) = v.parse::<u32>() {
            settings.max_new_tokens = Some(parsed);
        }
    }

    settings
}

pub fn normalize_endpoint_url(raw: &str) -> anyhow::Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed = Url::parse(trimmed)
        .with_context(|| format!("invalid analysis endpoint url '{raw}'"))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        anyhow::bail!(
            "analysis endpoint url must use http or https, got '{}'",
            parsed.scheme()
        );
    }
    Ok(trimmed.to_string())
}
