use crate::{
    manifest::ManifestLocation,
    view::{Filter, Selection, SortDirection, SortField},
};
use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

pub const DEFAULT_ORIGIN: &str = "http://localhost:5173";
const DEV_MANIFEST_PATH: &str = "/manifest.json";
const PROD_MANIFEST_PATH: &str = "/ludoteca/manifest.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildMode {
    Development,
    Production,
}

impl BuildMode {
    /// Debug builds talk to the local dev server, release builds to the
    /// deployed sub-path.
    pub fn current() -> Self {
        if cfg!(debug_assertions) {
            BuildMode::Development
        } else {
            BuildMode::Production
        }
    }

    pub fn manifest_path(self) -> &'static str {
        match self {
            BuildMode::Development => DEV_MANIFEST_PATH,
            BuildMode::Production => PROD_MANIFEST_PATH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_origin")]
    pub origin: String,
    #[serde(default)]
    pub build_mode: Option<BuildMode>,
    #[serde(default)]
    pub manifest_url: Option<String>,
    #[serde(default)]
    pub default_sort: Option<String>,
    #[serde(default)]
    pub default_sort_direction: Option<String>,
    #[serde(default)]
    pub default_platform: Option<String>,
    #[serde(default)]
    pub default_source: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            build_mode: None,
            manifest_url: None,
            default_sort: None,
            default_sort_direction: None,
            default_platform: None,
            default_source: None,
        }
    }
}

impl AppConfig {
    pub fn load_or_create() -> Result<Self> {
        let base_dir = base_data_dir()?;
        fs::create_dir_all(&base_dir).context("create app data dir")?;
        let path = base_dir.join("config.json");
        if path.exists() {
            let raw = fs::read_to_string(&path).context("read app config")?;
            let config: AppConfig = serde_json::from_str(&raw).context("parse app config")?;
            return Ok(config);
        }

        let config = AppConfig::default();
        config.save()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let base_dir = base_data_dir()?;
        fs::create_dir_all(&base_dir).context("create app data dir")?;
        let path = base_dir.join("config.json");
        let raw = serde_json::to_string_pretty(self).context("serialize app config")?;
        fs::write(path, raw).context("write app config")?;
        Ok(())
    }

    pub fn build_mode(&self) -> BuildMode {
        self.build_mode.unwrap_or_else(BuildMode::current)
    }

    /// Explicit override first, then the configured one, then origin plus
    /// the build mode's manifest path.
    pub fn manifest_location(&self, override_value: Option<&str>) -> ManifestLocation {
        if let Some(value) = override_value.filter(|value| !value.trim().is_empty()) {
            return ManifestLocation::parse(value);
        }
        if let Some(value) = self
            .manifest_url
            .as_deref()
            .filter(|value| !value.trim().is_empty())
        {
            return ManifestLocation::parse(value);
        }
        let origin = self.origin.trim().trim_end_matches('/');
        ManifestLocation::Url(format!("{origin}{}", self.build_mode().manifest_path()))
    }

    pub fn default_selection(&self) -> Selection {
        let sort_by = self
            .default_sort
            .as_deref()
            .and_then(SortField::parse)
            .unwrap_or_default();
        let sort_direction = self
            .default_sort_direction
            .as_deref()
            .and_then(SortDirection::parse)
            .unwrap_or_default();
        Selection {
            platform: self
                .default_platform
                .as_deref()
                .map(Filter::parse)
                .unwrap_or_default(),
            source: self
                .default_source
                .as_deref()
                .map(Filter::parse)
                .unwrap_or_default(),
            sort_by,
            sort_direction,
            search_query: String::new(),
        }
    }

    pub fn remember_selection(&mut self, selection: &Selection) {
        self.default_sort = Some(selection.sort_by.key().to_string());
        self.default_sort_direction = Some(selection.sort_direction.label().to_string());
        self.default_platform = Some(selection.platform.as_str().to_string());
        self.default_source = Some(selection.source.as_str().to_string());
    }
}

pub fn base_data_dir() -> Result<PathBuf> {
    let base = BaseDirs::new().context("resolve home dir")?;
    Ok(base.data_local_dir().join("ludoteca"))
}

fn default_origin() -> String {
    DEFAULT_ORIGIN.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_url_follows_build_mode() {
        let mut config = AppConfig {
            origin: "https://games.example.org/".to_string(),
            build_mode: Some(BuildMode::Production),
            ..AppConfig::default()
        };
        assert_eq!(
            config.manifest_location(None),
            ManifestLocation::Url("https://games.example.org/ludoteca/manifest.json".to_string())
        );
        config.build_mode = Some(BuildMode::Development);
        assert_eq!(
            config.manifest_location(None),
            ManifestLocation::Url("https://games.example.org/manifest.json".to_string())
        );
    }

    #[test]
    fn overrides_take_precedence() {
        let config = AppConfig {
            manifest_url: Some("https://cdn.example.org/manifest.json".to_string()),
            ..AppConfig::default()
        };
        assert_eq!(
            config.manifest_location(None),
            ManifestLocation::Url("https://cdn.example.org/manifest.json".to_string())
        );
        assert_eq!(
            config.manifest_location(Some("fixtures/manifest.json")),
            ManifestLocation::File(PathBuf::from("fixtures/manifest.json"))
        );
        assert_eq!(
            config.manifest_location(Some("  ")),
            ManifestLocation::Url("https://cdn.example.org/manifest.json".to_string())
        );
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{ "default_sort": "metacritic" }"#).unwrap();
        assert_eq!(config.origin, DEFAULT_ORIGIN);
        let selection = config.default_selection();
        assert_eq!(selection.sort_by, SortField::Metacritic);
        assert_eq!(selection.source, Filter::All);
    }

    #[test]
    fn remembered_selection_round_trips() {
        let mut config = AppConfig::default();
        let selection = Selection {
            platform: Filter::Only("steamdeck".to_string()),
            source: Filter::Only("gog".to_string()),
            sort_by: SortField::ReleaseDate,
            sort_direction: SortDirection::Desc,
            search_query: "ignored".to_string(),
        };
        config.remember_selection(&selection);
        let restored = config.default_selection();
        assert_eq!(restored.platform, selection.platform);
        assert_eq!(restored.source, selection.source);
        assert_eq!(restored.sort_by, selection.sort_by);
        assert_eq!(restored.sort_direction, selection.sort_direction);
        assert!(restored.search_query.is_empty());
    }
}
