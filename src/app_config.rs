use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::time::Duration;
use url::Url;

use crate::dom::Selector;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Catalog site settings
    #[serde(default)]
    pub site: SiteConfig,

    /// Element patterns used to read and decorate the page
    #[serde(default)]
    pub selectors: SelectorConfig,

    /// Debounce, pacing and timeout settings
    #[serde(default)]
    pub timings: TimingConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Catalog site settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SiteConfig {
    /// Base URL used to build item page locators and resolve relative links
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path of the single-item (watch) page
    #[serde(default = "default_watch_path")]
    pub watch_path: String,

    /// Path of the search results page
    #[serde(default = "default_search_path")]
    pub search_path: String,

    /// Path of the home page
    #[serde(default = "default_home_path")]
    pub home_path: String,

    /// Query parameter carrying the item identifier
    #[serde(default = "default_item_param")]
    pub item_param: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            watch_path: default_watch_path(),
            search_path: default_search_path(),
            home_path: default_home_path(),
            item_param: default_item_param(),
        }
    }
}

/// Element patterns, written as simple selector lists
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SelectorConfig {
    /// Container that receives the single-item download button
    #[serde(default = "default_watch_container")]
    pub watch_container: String,

    /// Root observed by the single-item flow
    #[serde(default = "default_app_root")]
    pub app_root: String,

    /// Item elements whose insertion triggers a reconciliation pass
    #[serde(default = "default_item_elements")]
    pub item_elements: String,

    /// Elements that receive a selection checkbox during a pass
    #[serde(default = "default_item_scan")]
    pub item_scan: String,

    /// Compact item variant (checkbox uses a smaller top offset)
    #[serde(default = "default_compact_item")]
    pub compact_item: String,

    /// Preferred checkbox host inside an item element
    #[serde(default = "default_checkbox_host")]
    pub checkbox_host: String,

    /// Link carrying the item identifier
    #[serde(default = "default_thumbnail")]
    pub thumbnail: String,

    /// Element carrying the item title
    #[serde(default = "default_title")]
    pub title: String,

    /// Containers observed by the reconciler
    #[serde(default = "default_observe_targets")]
    pub observe_targets: Vec<String>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            watch_container: default_watch_container(),
            app_root: default_app_root(),
            item_elements: default_item_elements(),
            item_scan: default_item_scan(),
            compact_item: default_compact_item(),
            checkbox_host: default_checkbox_host(),
            thumbnail: default_thumbnail(),
            title: default_title(),
            observe_targets: default_observe_targets(),
        }
    }
}

/// Timing settings, all in milliseconds unless noted
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TimingConfig {
    /// Quiescence window applied to change notifications
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Delay between consecutive downloads
    #[serde(default = "default_download_delay_ms")]
    pub download_delay_ms: u64,

    /// How long transient notifications stay visible
    #[serde(default = "default_toast_ms")]
    pub toast_ms: u64,

    /// How long the single-item flow keeps looking for its container
    #[serde(default = "default_container_timeout_ms")]
    pub container_timeout_ms: u64,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            download_delay_ms: default_download_delay_ms(),
            toast_ms: default_toast_ms(),
            container_timeout_ms: default_container_timeout_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl TimingConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn download_delay(&self) -> Duration {
        Duration::from_millis(self.download_delay_ms)
    }

    pub fn toast(&self) -> Duration {
        Duration::from_millis(self.toast_ms)
    }

    pub fn container_timeout(&self) -> Duration {
        Duration::from_millis(self.container_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Matching `log` crate filter
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_base_url() -> String {
    "https://www.youtube.com".to_string()
}

fn default_watch_path() -> String {
    "/watch".to_string()
}

fn default_search_path() -> String {
    "/results".to_string()
}

fn default_home_path() -> String {
    "/".to_string()
}

fn default_item_param() -> String {
    "v".to_string()
}

fn default_watch_container() -> String {
    "#above-the-fold".to_string()
}

fn default_app_root() -> String {
    "ytd-app".to_string()
}

fn default_item_elements() -> String {
    "ytd-video-renderer, ytd-compact-video-renderer".to_string()
}

fn default_item_scan() -> String {
    "ytd-video-renderer, ytd-compact-video-renderer, #dismissible".to_string()
}

fn default_compact_item() -> String {
    "ytd-compact-video-renderer".to_string()
}

fn default_checkbox_host() -> String {
    "#dismissible".to_string()
}

fn default_thumbnail() -> String {
    "a#thumbnail".to_string()
}

fn default_title() -> String {
    "#video-title".to_string()
}

fn default_observe_targets() -> Vec<String> {
    vec![
        "#content".to_string(),
        "ytd-watch-next-secondary-results-renderer".to_string(),
        "#related".to_string(),
    ]
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_download_delay_ms() -> u64 {
    500 // keeps the host from throttling multiple downloads
}

fn default_toast_ms() -> u64 {
    2000
}

fn default_container_timeout_ms() -> u64 {
    5000
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        self.base_url()?;

        if self.site.item_param.is_empty() {
            return Err(anyhow!("Item query parameter must not be empty"));
        }

        if self.timings.debounce_ms == 0 {
            return Err(anyhow!("Debounce window must be greater than zero"));
        }

        let selectors = &self.selectors;
        for pattern in [
            &selectors.watch_container,
            &selectors.app_root,
            &selectors.item_elements,
            &selectors.item_scan,
            &selectors.compact_item,
            &selectors.checkbox_host,
            &selectors.thumbnail,
            &selectors.title,
        ]
        .into_iter()
        .chain(selectors.observe_targets.iter())
        {
            Selector::parse(pattern)
                .with_context(|| format!("Invalid selector in configuration: '{}'", pattern))?;
        }

        if selectors.observe_targets.is_empty() {
            return Err(anyhow!("At least one observe target is required"));
        }

        Ok(())
    }

    /// Parsed base URL
    pub fn base_url(&self) -> Result<Url> {
        Url::parse(&self.site.base_url)
            .with_context(|| format!("Invalid base URL: {}", self.site.base_url))
    }
}
