use std::{collections::HashMap, fs, io, path::Path, time::Duration};

use anyhow::{bail, Context};
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "fleet.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_url: String,
    pub timeout_secs: u64,
    pub toast_ms: u64,
    pub token: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3000/api".into(),
            timeout_secs: 30,
            toast_ms: 5000,
            token: None,
        }
    }
}

impl Settings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn toast_duration(&self) -> Duration {
        Duration::from_millis(self.toast_ms)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let url = Url::parse(&self.api_url)
            .with_context(|| format!("api_url '{}' is not a valid URL", self.api_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("api_url '{}' must use http or https", self.api_url);
        }
        if self.timeout_secs == 0 {
            bail!("timeout_secs must be greater than zero");
        }
        Ok(())
    }
}

/// Defaults, then `fleet.toml` (or `FLEET_CONFIG`), then environment.
pub fn load_settings() -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let path = std::env::var("FLEET_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
    if let Some(file_cfg) = read_config_file(Path::new(&path))? {
        apply_file(&mut settings, &file_cfg)?;
    }
    apply_env(&mut settings, |key| std::env::var(key).ok())?;

    Ok(settings)
}

fn read_config_file(path: &Path) -> anyhow::Result<Option<HashMap<String, String>>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read '{}'", path.display()))
        }
    };
    let parsed = toml::from_str::<HashMap<String, String>>(&raw)
        .with_context(|| format!("failed to parse '{}'", path.display()))?;
    Ok(Some(parsed))
}

fn apply_file(settings: &mut Settings, file_cfg: &HashMap<String, String>) -> anyhow::Result<()> {
    if let Some(v) = file_cfg.get("api_url") {
        settings.api_url = v.clone();
    }
    if let Some(v) = file_cfg.get("timeout_secs") {
        settings.timeout_secs = parse_number("timeout_secs", v)?;
    }
    if let Some(v) = file_cfg.get("toast_ms") {
        settings.toast_ms = parse_number("toast_ms", v)?;
    }
    if let Some(v) = file_cfg.get("token") {
        settings.token = Some(v.clone());
    }
    Ok(())
}

fn apply_env(
    settings: &mut Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    if let Some(v) = lookup("FLEET_API_URL") {
        settings.api_url = v;
    }
    if let Some(v) = lookup("APP__API_URL") {
        settings.api_url = v;
    }

    if let Some(v) = lookup("FLEET_TIMEOUT_SECS") {
        settings.timeout_secs = parse_number("FLEET_TIMEOUT_SECS", &v)?;
    }
    if let Some(v) = lookup("APP__TIMEOUT_SECS") {
        settings.timeout_secs = parse_number("APP__TIMEOUT_SECS", &v)?;
    }

    if let Some(v) = lookup("FLEET_TOAST_MS") {
        settings.toast_ms = parse_number("FLEET_TOAST_MS", &v)?;
    }
    if let Some(v) = lookup("APP__TOAST_MS") {
        settings.toast_ms = parse_number("APP__TOAST_MS", &v)?;
    }

    if let Some(v) = lookup("FLEET_TOKEN") {
        settings.token = Some(v);
    }
    Ok(())
}

fn parse_number(key: &str, raw: &str) -> anyhow::Result<u64> {
    raw.trim()
        .parse::<u64>()
        .with_context(|| format!("{key} must be a whole number, got '{raw}'"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
