//! Conversion settings, loadable from TOML
//!
//! Every field is optional; a missing file section means its defaults.
//!
//! ```toml
//! output_dir = "outputs"
//!
//! [calculation]
//! circular = "iterate"
//! max_iterations = 200
//!
//! [export]
//! values = false
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::calculation::{CalculationOptions, CircularMode};
use crate::error::{ConvertError, Result};

/// Settings for [`crate::convert`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConvertConfig {
    /// Directory that receives one sub-directory per converted file
    pub output_dir: PathBuf,
    pub calculation: CalculationConfig,
    pub export: ExportConfig,
    pub codegen: CodegenConfig,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("outputs"),
            calculation: CalculationConfig::default(),
            export: ExportConfig::default(),
            codegen: CodegenConfig::default(),
        }
    }
}

impl ConvertConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ConvertError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: ConvertConfig =
            toml::from_str(content).map_err(|e| ConvertError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.calculation.max_iterations == 0 {
            return Err(ConvertError::Config(
                "calculation.max_iterations must be at least 1".into(),
            ));
        }
        let max_change = self.calculation.max_change;
        if max_change.is_nan() || max_change < 0.0 {
            return Err(ConvertError::Config(
                "calculation.max_change must be a non-negative number".into(),
            ));
        }
        if !self.export.delimiter.is_ascii() {
            return Err(ConvertError::Config(format!(
                "export.delimiter must be a single ASCII character, got '{}'",
                self.export.delimiter
            )));
        }
        if self.codegen.file_name.is_empty() || self.codegen.file_name.contains(['/', '\\']) {
            return Err(ConvertError::Config(format!(
                "codegen.file_name must be a plain file name, got '{}'",
                self.codegen.file_name
            )));
        }
        Ok(())
    }
}

/// `[calculation]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CalculationConfig {
    pub circular: CircularMode,
    pub max_iterations: u32,
    pub max_change: f64,
}

impl Default for CalculationConfig {
    fn default() -> Self {
        let options = CalculationOptions::default();
        Self {
            circular: options.circular,
            max_iterations: options.max_iterations,
            max_change: options.max_change,
        }
    }
}

impl CalculationConfig {
    pub fn options(&self) -> CalculationOptions {
        CalculationOptions {
            circular: self.circular,
            max_iterations: self.max_iterations,
            max_change: self.max_change,
        }
    }
}

/// `[export]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    /// Also write each sheet's computed value grid
    pub values: bool,
    pub delimiter: char,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            values: true,
            delimiter: ',',
        }
    }
}

/// `[codegen]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodegenConfig {
    pub enabled: bool,
    pub file_name: String,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            file_name: "main.rs".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(ConvertConfig::from_toml("").unwrap(), ConvertConfig::default());
    }

    #[test]
    fn test_partial_config() {
        let config = ConvertConfig::from_toml(
            r#"
            output_dir = "build/out"

            [calculation]
            circular = "iterate"
            max_iterations = 50

            [export]
            values = false
            "#,
        )
        .unwrap();

        assert_eq!(config.output_dir, PathBuf::from("build/out"));
        assert_eq!(config.calculation.circular, CircularMode::Iterate);
        assert_eq!(config.calculation.max_iterations, 50);
        assert_eq!(config.calculation.max_change, 0.001);
        assert!(!config.export.values);
        assert_eq!(config.export.delimiter, ',');
        assert!(config.codegen.enabled);
    }

    #[test]
    fn test_invalid_configs() {
        for bad in [
            "[calculation]\ncircular = \"sometimes\"",
            "[calculation]\nmax_iterations = 0",
            "[export]\ndelimiter = \"é\"",
            "[codegen]\nfile_name = \"../main.rs\"",
            "unknown_key = 1",
        ] {
            let err = ConvertConfig::from_toml(bad).unwrap_err();
            assert!(matches!(err, ConvertError::Config(_)), "{}", bad);
        }
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cellforge.toml");
        std::fs::write(&path, "[codegen]\nenabled = false\n").unwrap();

        let config = ConvertConfig::from_file(&path).unwrap();
        assert!(!config.codegen.enabled);

        let missing = ConvertConfig::from_file(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(missing, ConvertError::Config(_)));
    }
}
