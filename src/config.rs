use std::{fs, path::{Path, PathBuf}, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Settings for the explorer, read from an optional TOML file.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    /// Directory holding `geo_hk.json` and `geo_hk_simple.json`.
    pub data_dir: PathBuf,
    /// JSON array of `{ "name", "value" }` rows; built-in districts when unset.
    pub metrics_file: Option<PathBuf>,
    /// JSON category tree for the treemap page; built-in tree when unset.
    pub categories_file: Option<PathBuf>,
    pub title: String,
    pub metric_label: String,
    pub reveal_delay_ms: u64,
    pub layout: LayoutConfig,
    pub log_file: PathBuf,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            metrics_file: None,
            categories_file: None,
            title: "Hong Kong District Population".to_string(),
            metric_label: "Population".to_string(),
            reveal_delay_ms: 1000,
            layout: LayoutConfig::default(),
            log_file: PathBuf::from("region-atlas.log"),
        }
    }
}

impl ExplorerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let txt = fs::read_to_string(path)?;
        Self::from_toml(&txt)
    }

    pub fn from_toml(txt: &str) -> Result<Self> {
        Ok(toml::from_str(txt)?)
    }

    pub fn reveal_delay(&self) -> Duration {
        Duration::from_millis(self.reveal_delay_ms)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Viewport widths below this are laid out compactly.
    pub compact_breakpoint_px: u32,
    /// Pixels per terminal column, used to turn a column count into a width.
    pub cell_width_px: u32,
    pub resize_debounce_ms: u64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            compact_breakpoint_px: 768,
            cell_width_px: 8,
            resize_debounce_ms: 150,
        }
    }
}

impl LayoutConfig {
    pub fn columns_to_px(&self, columns: u16) -> u32 {
        u32::from(columns) * self.cell_width_px
    }

    pub fn resize_debounce(&self) -> Duration {
        Duration::from_millis(self.resize_debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_web_breakpoint() {
        let cfg = ExplorerConfig::default();
        assert_eq!(cfg.layout.compact_breakpoint_px, 768);
        assert_eq!(cfg.reveal_delay(), Duration::from_millis(1000));
        assert_eq!(cfg.layout.columns_to_px(96), 768);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = ExplorerConfig::from_toml(
            r#"
            title = "Districts"
            [layout]
            cell_width_px = 10
            "#,
        )
        .unwrap();
        assert_eq!(cfg.title, "Districts");
        assert_eq!(cfg.metric_label, "Population");
        assert_eq!(cfg.layout.cell_width_px, 10);
        assert_eq!(cfg.layout.compact_breakpoint_px, 768);
        assert_eq!(cfg.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = ExplorerConfig::from_toml("reveal_delay_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, crate::error::AtlasError::Config(_)));
    }
}
