use std::fs;

use anyhow::{Context, Result};
use serde::Deserialize;
use url::Url;

#[derive(Debug)]
pub struct Settings {
    pub server_url: String,
    pub page_size: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:5000/api".into(),
            page_size: 10,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    server_url: Option<String>,
    page_size: Option<u32>,
}

/// Defaults, overridden by `taskdash.toml`, overridden by env vars.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("taskdash.toml") {
        if let Ok(file_cfg) = toml::from_str::<FileSettings>(&raw) {
            if let Some(v) = file_cfg.server_url {
                settings.server_url = v;
            }
            if let Some(v) = file_cfg.page_size {
                settings.page_size = v;
            }
        }
    }

    if let Ok(v) = std::env::var("TASKDASH_SERVER_URL") {
        settings.server_url = v;
    }
    if let Ok(v) = std::env::var("TASKDASH_PAGE_SIZE") {
        if let Ok(parsed) = v.parse() {
            settings.page_size = parsed;
        }
    }

    settings
}

pub fn validate_server_url(server_url: &str) -> Result<()> {
    let url = Url::parse(server_url)
        .with_context(|| format!("invalid server url: {server_url}"))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        anyhow::bail!("server url must use http or https: {server_url}");
    }
    Ok(())
}
