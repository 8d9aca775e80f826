//! Scoring mode settings.
//!
//! Stored as a JSON table, one row per mode, with exactly one row expected to
//! be selected:
//! ```json
//! {
//!   "modes": [
//!     { "selected": true,  "mode_name": "3段階評価モード", "param1": "", "param2": "" },
//!     { "selected": false, "mode_name": "3段階カスタムモード", "param1": "100", "param2": "60" }
//!   ]
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, warn};

use crate::analyzers::types::{CustomParams, ModeConfig, ScoreMode};
use crate::analyzers::utility::parse_leading_number;
use crate::error::EngineError;

/// Default location of the settings file.
pub const DEFAULT_SETTINGS_PATH: &str = "setting.json";

/// One row of the settings table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingRow {
    #[serde(default)]
    pub selected: bool,
    pub mode_name: String,
    #[serde(default)]
    pub description: String,
    /// `満点 >=` threshold for the custom mode.
    #[serde(default)]
    pub param1: Value,
    /// `部分点 >=` threshold for the custom mode.
    #[serde(default)]
    pub param2: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeSettings {
    pub modes: Vec<SettingRow>,
}

/// A resolved mode plus any non-fatal problems found while reading it.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeResolution {
    pub config: ModeConfig,
    pub warnings: Vec<EngineError>,
}

impl Default for ModeSettings {
    fn default() -> Self {
        let row = |selected: bool, name: &str, description: &str, p1: &str, p2: &str| SettingRow {
            selected,
            mode_name: name.to_string(),
            description: description.to_string(),
            param1: Value::String(p1.to_string()),
            param2: Value::String(p2.to_string()),
        };

        Self {
            modes: vec![
                row(true, "3段階評価モード", "未提出:0, 部分点:1, 満点:2 で評価します。(デフォルト)", "", ""),
                row(false, "提出チェックモード", "未提出/0点:0, 提出済み:1 で評価します。", "", ""),
                row(false, "3段階カスタムモード", "右記の点数で評価します (未提出:0, 部分点:1, 満点:2)。", "100", "60"),
                row(false, "割合モード", "満点に対する得点率で評価します (0.0 ~ 1.0)。", "", ""),
                row(false, "素点モード", "課題の得点をそのまま評価値として使用します。", "", ""),
            ],
        }
    }
}

impl ModeSettings {
    /// Loads the settings table from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?;
        let settings = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse settings in {}", path.display()))?;
        Ok(settings)
    }

    /// Writes the default table to `path` unless a file already exists there.
    ///
    /// Returns `true` when a new file was created.
    pub fn write_default(path: &Path) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let body = serde_json::to_string_pretty(&Self::default())?;
        std::fs::write(path, body)
            .with_context(|| format!("failed to write settings to {}", path.display()))?;
        Ok(true)
    }

    /// Picks the first selected row and turns it into a [`ModeConfig`].
    ///
    /// No selection or an unknown mode name falls back to the three-step mode.
    pub fn resolve(&self) -> ModeResolution {
        let Some(row) = self.modes.iter().find(|r| r.selected) else {
            debug!("No mode selected, using three-step mode");
            return ModeResolution {
                config: ModeConfig::default(),
                warnings: Vec::new(),
            };
        };

        let mut warnings = Vec::new();
        let mode = match row.mode_name.trim() {
            "提出チェックモード" => ScoreMode::Binary,
            "3段階カスタムモード" => ScoreMode::Custom,
            "割合モード" => ScoreMode::Percentage,
            "素点モード" => ScoreMode::RawScore,
            _ => ScoreMode::ThreeStep,
        };

        let params = (mode == ScoreMode::Custom).then(|| CustomParams {
            full: param_or_zero("full", &row.param1, &mut warnings),
            partial: param_or_zero("partial", &row.param2, &mut warnings),
        });

        ModeResolution {
            config: ModeConfig::new(mode, params),
            warnings,
        }
    }
}

/// Resolves the mode from the settings file at `path`; a missing file means defaults.
pub fn resolve_mode(path: &Path) -> Result<ModeResolution> {
    if !path.exists() {
        debug!(path = %path.display(), "Settings file not found, using three-step mode");
        return Ok(ModeSettings::default().resolve());
    }
    let resolution = ModeSettings::load(path)?.resolve();
    for w in &resolution.warnings {
        warn!(warning = %w, "Settings problem");
    }
    Ok(resolution)
}

fn param_or_zero(name: &'static str, raw: &Value, warnings: &mut Vec<EngineError>) -> f64 {
    let parsed = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_leading_number(s),
        _ => None,
    };
    parsed.unwrap_or_else(|| {
        let raw = match raw {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        };
        warnings.push(EngineError::InvalidModeParams { name, raw });
        0.0
    })
}
