use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::types::SortMode;

/// RGB color representation for config
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_color(self) -> ratatui::style::Color {
        ratatui::style::Color::Rgb(self.r, self.g, self.b)
    }
}

/// Display settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Sort mode on startup: "best", "new", "top" or "controversial"
    pub default_sort: String,

    /// Show score and vote tallies next to each comment
    pub show_scores: bool,

    /// Show "3h ago" instead of absolute timestamps
    pub relative_times: bool,

    /// Maximum wrapped body lines per comment (0 = unlimited)
    pub max_body_lines: usize,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            default_sort: "best".to_string(),
            show_scores: true,
            relative_times: true,
            max_body_lines: 0,
        }
    }
}

/// Thread color settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadColors {
    /// Accent color used for the header, authors and active elements
    pub accent: RgbColor,

    /// Thread connector lines
    pub connector: RgbColor,

    /// Upvote marker and tally
    pub upvote: RgbColor,

    /// Downvote marker and tally
    pub downvote: RgbColor,

    /// Background of the selected comment
    pub selected_bg: RgbColor,

    /// Background of the whole view
    pub background: RgbColor,
}

impl Default for ThreadColors {
    fn default() -> Self {
        Self {
            accent: RgbColor::new(106, 50, 159),
            connector: RgbColor::new(90, 90, 110),
            upvote: RgbColor::new(230, 120, 40),
            downvote: RgbColor::new(110, 140, 230),
            selected_bg: RgbColor::new(45, 45, 65),
            background: RgbColor::new(22, 22, 22),
        }
    }
}

/// Navigation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationSettings {
    /// Number of rows to move with Ctrl-d / Ctrl-u
    pub scroll_lines: usize,

    /// Fetch the next page when the cursor reaches the last comment
    pub auto_load_more: bool,
}

impl Default for NavigationSettings {
    fn default() -> Self {
        Self {
            scroll_lines: 10,
            auto_load_more: true,
        }
    }
}

/// Local discussion file settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    /// Root comments served per page (0 = everything at once)
    pub page_size: usize,

    /// Author name recorded on comments you create
    pub author: String,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            page_size: 20,
            author: "me".to_string(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds a failure notice stays in the footer
    pub notice_secs: u64,

    /// Display settings
    #[serde(default)]
    pub display: DisplaySettings,

    /// Thread color settings
    #[serde(default)]
    pub colors: ThreadColors,

    /// Navigation settings
    #[serde(default)]
    pub navigation: NavigationSettings,

    /// Local discussion file settings
    #[serde(default)]
    pub backend: BackendSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            notice_secs: 4,
            display: DisplaySettings::default(),
            colors: ThreadColors::default(),
            navigation: NavigationSettings::default(),
            backend: BackendSettings::default(),
        }
    }
}

impl Config {
    /// Directory holding config.toml and the debug log (~/.config/kaiwa)
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("kaiwa"))
    }

    /// Get the config file path (~/.config/kaiwa/config.toml)
    fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.toml"))
    }

    /// Load configuration from file, or return default if not found
    pub fn load() -> Self {
        let path = match Self::config_path() {
            Some(p) => p,
            None => return Self::default(),
        };

        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "invalid config, using defaults");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Startup sort mode; unknown names fall back to `best`
    pub fn default_sort(&self) -> SortMode {
        self.display.default_sort.parse().unwrap_or_default()
    }

    pub fn notice_ttl(&self) -> Duration {
        Duration::from_secs(self.notice_secs)
    }
}
