use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Result;

/// Runtime configuration, loaded from `config.toml`.
///
/// A local `./config.toml` wins; otherwise the platform config directory is
/// tried; otherwise the built-in defaults (the seven NHK regional feeds the
/// tracker was written for) apply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default = "default_sources")]
    pub sources: Vec<Source>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database: DatabaseConfig::default(),
            fetch: FetchConfig::default(),
            report: ReportConfig::default(),
            sources: default_sources(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            concurrency: default_concurrency(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Look-back window for the per-run change report, in hours.
    #[serde(default = "default_report_hours")]
    pub hours: i64,
    #[serde(default = "default_report_dir")]
    pub output_dir: String,
    #[serde(default = "default_export_dir")]
    pub export_dir: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        ReportConfig {
            hours: default_report_hours(),
            output_dir: default_report_dir(),
            export_dir: default_export_dir(),
        }
    }
}

/// One monitored feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub url: String,
    /// Base joined onto the relative article links NHK feeds carry.
    pub base_url: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Source {
    /// Resolves a (possibly relative) article link against this source's base.
    pub fn full_url(&self, link: &str) -> String {
        if link.starts_with("http://") || link.starts_with("https://") {
            return link.to_string();
        }
        match &self.base_url {
            Some(base) => Url::parse(base)
                .and_then(|b| b.join(link))
                .map(String::from)
                .unwrap_or_else(|_| link.to_string()),
            None => link.to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let local = Path::new("config.toml");
        if local.exists() {
            return Self::load_from(local);
        }
        if let Some(path) = Self::default_config_path() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }
        Ok(Config::default())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }

    fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("nhk-tracker").join("config.toml"))
    }

    pub fn enabled_sources(&self) -> impl Iterator<Item = &Source> {
        self.sources.iter().filter(|s| s.enabled)
    }
}

fn default_db_path() -> String {
    "data/articles.db".to_string()
}

fn default_concurrency() -> usize {
    5
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_report_hours() -> i64 {
    24
}

fn default_report_dir() -> String {
    "reports".to_string()
}

fn default_export_dir() -> String {
    "data".to_string()
}

fn default_true() -> bool {
    true
}

fn regional(name: &str, slug: &str) -> Source {
    Source {
        name: name.to_string(),
        url: format!("https://www3.nhk.or.jp/{slug}/data.xml"),
        base_url: Some(format!("https://www3.nhk.or.jp/{slug}/")),
        enabled: true,
    }
}

fn default_sources() -> Vec<Source> {
    vec![
        regional("NHK首都圏ニュース", "shutoken-news"),
        regional("NHK福岡ニュース", "fukuoka-news"),
        regional("NHK札幌ニュース", "sapporo-news"),
        regional("NHK東海ニュース", "tokai-news"),
        regional("NHK広島ニュース", "hiroshima-news"),
        regional("NHK関西ニュース", "kansai-news"),
        Source {
            name: "NHK東北ニュース".to_string(),
            url: "https://news.web.nhk/tohoku-news/data.xml".to_string(),
            base_url: Some("https://news.web.nhk/tohoku-news/".to_string()),
            enabled: true,
        },
    ]
}
