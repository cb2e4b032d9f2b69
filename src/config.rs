//! Run configuration.
//!
//! Handles loading, validating, and rewriting the `config.toml` that lives in
//! the data directory. Stock defaults are the base layer; the user file only
//! needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [catalog]
//! mode = "daily"                    # daily, weekly, monthly, rookie, original, male, female,
//!                                   # follow, bookmark, recommended, artist, tag_search
//! artist_id = ""                    # required by mode = "artist"
//! tag = ""                          # required by mode = "tag_search"
//! user_id = ""                      # required by mode = "bookmark"
//! auth_fail_action = "change_to_ranking"   # or "ranking_once", "abort"
//! network_bypass = false            # resolve hosts over DNS-over-HTTPS
//!
//! [filter]
//! allow_manga = false
//! aspect_ratio = "any"              # any, landscape, portrait
//! min_views = 0                     # units of 500 views
//! min_width = 0                     # units of 10 px
//! min_height = 0                    # units of 10 px
//! # max_file_size_mb = 20
//!
//! [filter.allowed_ratings]
//! levels = [2]                      # any of 2, 4, 6
//! allow_restricted = false
//!
//! [download]
//! count = 2
//! auto_crop = false
//! extensions = [".jpg", ".png"]
//!
//! [auth]
//! token_env = "PIXIV_FETCH_TOKEN"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::auth::AuthFailAction;
use crate::http::Timeouts;
use crate::resolver::DEFAULT_REFERER;
use crate::source::auth_feed::APP_API_URL;
use crate::source::ranking::RANKING_URL;
use crate::source::{AuthFeedMode, UpdateMode};
use crate::types::{FilterCriteria, GRADUATED_LEVELS};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const CONFIG_FILENAME: &str = "config.toml";
/// Upper bound on `download.count`.
pub const MAX_COUNT: u32 = 50;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML write error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Everything `config.toml` can hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub catalog: CatalogConfig,
    pub filter: FilterCriteria,
    pub download: DownloadConfig,
    pub auth: AuthConfig,
}

/// Which feed to read and how to reach it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogConfig {
    pub mode: UpdateMode,
    pub artist_id: String,
    pub tag: String,
    /// Account whose bookmarks `mode = "bookmark"` reads.
    pub user_id: String,
    pub auth_fail_action: AuthFailAction,
    /// Sent with every image request; the image host rejects requests without it.
    pub referer: String,
    pub ranking_url: String,
    pub api_url: String,
    /// Look host names up through DNS-over-HTTPS instead of the system resolver.
    pub network_bypass: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            mode: UpdateMode::Daily,
            artist_id: String::new(),
            tag: String::new(),
            user_id: String::new(),
            auth_fail_action: AuthFailAction::ChangeToRanking,
            referer: DEFAULT_REFERER.to_string(),
            ranking_url: RANKING_URL.to_string(),
            api_url: APP_API_URL.to_string(),
            network_bypass: false,
        }
    }
}

impl CatalogConfig {
    /// Authenticated feed for `mode`, or `None` for ranking modes.
    pub fn auth_feed_mode(&self, mode: UpdateMode) -> Option<AuthFeedMode> {
        Some(match mode {
            UpdateMode::Follow => AuthFeedMode::Follow,
            UpdateMode::Bookmark => AuthFeedMode::Bookmark {
                user_id: self.user_id.clone(),
            },
            UpdateMode::Recommended => AuthFeedMode::Recommended,
            UpdateMode::Artist => AuthFeedMode::Artist {
                artist_id: self.artist_id.clone(),
            },
            UpdateMode::TagSearch => AuthFeedMode::TagSearch {
                tag: self.tag.clone(),
            },
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DownloadConfig {
    /// Artworks to collect per run.
    pub count: u32,
    /// Crop uniform borders off downloaded images.
    pub auto_crop: bool,
    /// Extensions probed, in order, when only a thumbnail URL is known.
    pub extensions: Vec<String>,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            count: 2,
            auto_crop: false,
            extensions: vec![".jpg".to_string(), ".png".to_string()],
            connect_timeout_secs: 10,
            read_timeout_secs: 60,
        }
    }
}

impl DownloadConfig {
    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            connect: Duration::from_secs(self.connect_timeout_secs),
            read: Duration::from_secs(self.read_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Bearer token. Prefer `token_env` to keep it out of the file.
    pub token: Option<String>,
    /// Environment variable consulted when `token` is unset.
    pub token_env: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token: None,
            token_env: "PIXIV_FETCH_TOKEN".to_string(),
        }
    }
}

impl AppConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_count(self.download.count)?;
        if self.download.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "download.extensions must not be empty".into(),
            ));
        }
        if let Some(ext) = self.download.extensions.iter().find(|e| !e.starts_with('.')) {
            return Err(ConfigError::Validation(format!(
                "download.extensions entries must start with '.', got {ext:?}"
            )));
        }
        if self.download.connect_timeout_secs == 0 || self.download.read_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "download timeouts must be non-zero".into(),
            ));
        }
        let ratings = &self.filter.allowed_ratings;
        if let Some(level) = ratings.levels.iter().find(|l| !GRADUATED_LEVELS.contains(l)) {
            return Err(ConfigError::Validation(format!(
                "filter.allowed_ratings.levels must be 2, 4 or 6, got {level}"
            )));
        }
        if ratings.levels.is_empty() && !ratings.allow_restricted {
            return Err(ConfigError::Validation(
                "filter.allowed_ratings accepts nothing".into(),
            ));
        }
        let required = match self.catalog.mode {
            UpdateMode::Artist => Some(("catalog.artist_id", &self.catalog.artist_id)),
            UpdateMode::TagSearch => Some(("catalog.tag", &self.catalog.tag)),
            UpdateMode::Bookmark => Some(("catalog.user_id", &self.catalog.user_id)),
            _ => None,
        };
        if let Some((key, value)) = required
            && value.trim().is_empty()
        {
            return Err(ConfigError::Validation(format!(
                "{key} is required for mode {:?}",
                self.catalog.mode
            )));
        }
        Ok(())
    }
}

/// Check an artwork count, from the config file or the command line.
pub fn validate_count(count: u32) -> Result<u32, ConfigError> {
    if count == 0 || count > MAX_COUNT {
        return Err(ConfigError::Validation(format!(
            "count must be 1-{MAX_COUNT}, got {count}"
        )));
    }
    Ok(count)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(AppConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no `config.toml` exists in the directory.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<AppConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: AppConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(dir: &Path) -> Result<AppConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(dir)?;
    resolve_config(base, overlay)
}

/// Rewrite `catalog.mode` in the user's `config.toml`, keeping every other
/// key it sets. Comments in the file are not preserved.
pub fn set_update_mode(dir: &Path, mode: UpdateMode) -> Result<(), ConfigError> {
    let mut root = load_raw_config(dir)?.unwrap_or_else(|| toml::Value::Table(Default::default()));
    let mode_value = toml::Value::try_from(mode)?;

    let toml::Value::Table(table) = &mut root else {
        return Err(ConfigError::Validation(
            "config.toml must be a table".into(),
        ));
    };
    let catalog = table
        .entry("catalog")
        .or_insert_with(|| toml::Value::Table(Default::default()));
    let toml::Value::Table(catalog) = catalog else {
        return Err(ConfigError::Validation("[catalog] must be a table".into()));
    };
    catalog.insert("mode".to_string(), mode_value);

    fs::create_dir_all(dir)?;
    fs::write(dir.join(CONFIG_FILENAME), toml::to_string_pretty(&root)?)?;
    Ok(())
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# pixiv-fetch Configuration
# ==========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Catalog: where candidates come from
# ---------------------------------------------------------------------------
[catalog]
# Public rankings: daily, weekly, monthly, rookie, original, male, female.
# Feeds that need an access token: follow, bookmark, recommended, artist,
# tag_search.
mode = "daily"

# Artist whose works mode = "artist" reads.
artist_id = ""

# Tag searched by mode = "tag_search".
tag = ""

# Account whose public bookmarks mode = "bookmark" reads.
user_id = ""

# What to do when a token-protected mode has no usable token:
#   change_to_ranking  switch mode to "daily" in this file
#   ranking_once       fetch one daily-ranking artwork, keep the mode
#   abort              fail the run (exit code 75) so it is retried later
auth_fail_action = "change_to_ranking"

# Referer sent with image requests.
referer = "https://app-api.pixiv.net/"

ranking_url = "https://www.pixiv.net/ranking.php"
api_url = "https://app-api.pixiv.net"

# Look up host names with DNS-over-HTTPS (Cloudflare, 1.0.0.1) instead of the
# system resolver. Helps on networks whose DNS blocks or poisons pixiv.
network_bypass = false

# ---------------------------------------------------------------------------
# Filter: which candidates are acceptable
# ---------------------------------------------------------------------------
[filter]
allow_manga = false

# any, landscape (width >= height) or portrait (height >= width).
aspect_ratio = "any"

# Minimum views, in units of 500.
min_views = 0

# Minimum size, in units of 10 pixels. Landscape mode only checks the width,
# portrait mode only the height.
min_width = 0
min_height = 0

# Skip images larger than this many megabytes. Omit to disable.
# max_file_size_mb = 20

[filter.allowed_ratings]
# Sanity levels: 2 = safe, 4 = mild, 6 = suggestive.
levels = [2]
# R-18 works.
allow_restricted = false

# ---------------------------------------------------------------------------
# Download
# ---------------------------------------------------------------------------
[download]
# Artworks per run (1-50).
count = 2

# Crop uniform borders and save the result as PNG.
auto_crop = false

# Extensions tried, in order, for works that only list a thumbnail.
extensions = [".jpg", ".png"]

connect_timeout_secs = 10
read_timeout_secs = 60

# ---------------------------------------------------------------------------
# Access token
# ---------------------------------------------------------------------------
[auth]
# token = "..."
token_env = "PIXIV_FETCH_TOKEN"
"##
}
