// ============================================================================
// ENGINE CONFIG: JSON document with every field defaulted
// ============================================================================

use std::fs;
use std::path::{Path, PathBuf};

use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::components::brush::BrushSettings;
use crate::error::{CanvasError, ConfigError};

/// Session logger settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: LevelFilter,
    /// Log file location; `None` uses the platform data directory.
    pub path: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: LevelFilter::Info,
            path: None,
        }
    }
}

/// Startup configuration for a [`crate::project::Project`].
///
/// ```json
/// {
///   "canvas_width": 256,
///   "canvas_height": 256,
///   "brush": { "size": 9, "shape": "soft_circle", "intensity": 64.0, "mode": "multiply" },
///   "log": { "level": "debug" }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub canvas_width: usize,
    pub canvas_height: usize,
    pub brush: BrushSettings,
    pub log: LogSettings,
}

impl EngineConfig {
    /// Parse and validate.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&text)?;
        log::info!("loaded config {:?}", path);
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.canvas_width % 2 == 1 || self.canvas_height % 2 == 1 {
            return Err(CanvasError::OddSize {
                width: self.canvas_width,
                height: self.canvas_height,
            }
            .into());
        }
        self.brush.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::brush::{BrushMode, BrushShape};
    use crate::error::BrushError;
    use std::io::Write;

    #[test]
    fn empty_document_yields_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!((config.canvas_width, config.canvas_height), (0, 0));
        assert_eq!(config.brush.size, 1);
        assert_eq!(config.brush.shape, BrushShape::Square);
        assert_eq!(config.brush.intensity, 128.0);
        assert_eq!(config.brush.mode, BrushMode::Add);
        assert_eq!(config.log.level, LevelFilter::Info);
    }

    #[test]
    fn partial_brush_section_keeps_other_defaults() {
        let config = EngineConfig::from_json_str(
            r#"{ "canvas_width": 8, "canvas_height": 4, "brush": { "shape": "hard_circle", "size": 5 } }"#,
        )
        .unwrap();
        assert_eq!(config.canvas_width, 8);
        assert_eq!(config.brush.shape, BrushShape::HardCircle);
        assert_eq!(config.brush.size, 5);
        assert_eq!(config.brush.mode, BrushMode::Add);
    }

    #[test]
    fn odd_canvas_and_zero_brush_are_rejected() {
        let err = EngineConfig::from_json_str(r#"{ "canvas_width": 3 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Canvas(CanvasError::OddSize { width: 3, height: 0 })));

        let err = EngineConfig::from_json_str(r#"{ "brush": { "size": 0 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Brush(BrushError::InvalidSize(0))));
    }

    #[test]
    fn unknown_shape_name_is_a_json_error() {
        let err = EngineConfig::from_json_str(r#"{ "brush": { "shape": "triangle" } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn load_reads_file_and_reports_missing_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "canvas_width": 16, "canvas_height": 16, "log": {{ "level": "debug" }} }}"#).unwrap();
        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.canvas_width, 16);
        assert_eq!(config.log.level, LevelFilter::Debug);

        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        match EngineConfig::load(&missing) {
            Err(ConfigError::Io { path, .. }) => assert_eq!(path, missing),
            other => panic!("expected Io error, got {other:?}"),
        }
    }

    #[test]
    fn serialized_config_loads_back() {
        let mut config = EngineConfig::default();
        config.canvas_width = 32;
        config.canvas_height = 2;
        config.brush.mode = BrushMode::Set;
        let text = config.to_json_string().unwrap();
        assert!(text.contains("\"set\""));
        assert_eq!(EngineConfig::from_json_str(&text).unwrap(), config);
    }
}
