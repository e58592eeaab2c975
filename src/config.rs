/// Renderer configuration
///
/// Read once at startup from `<config dir>/dicom-display/config.json`. A
/// missing file means defaults; missing fields fall back one by one.

use std::fs;
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::gpu::wgpu;
use crate::palette::PaletteType;

const CONFIG_DIR_NAME: &str = "dicom-display";
const CONFIG_FILE_NAME: &str = "config.json";

fn default_prefer_gpu() -> bool {
    true
}

fn default_log_filter() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum PowerPreference {
    #[serde(rename = "low", alias = "low_power")]
    LowPower,
    #[serde(rename = "high", alias = "high_performance")]
    #[default]
    HighPerformance,
}

impl From<PowerPreference> for wgpu::PowerPreference {
    fn from(value: PowerPreference) -> Self {
        match value {
            PowerPreference::LowPower => wgpu::PowerPreference::LowPower,
            PowerPreference::HighPerformance => wgpu::PowerPreference::HighPerformance,
        }
    }
}

/// Resampling filter for CPU thumbnails
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ThumbnailFilter {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    #[default]
    Lanczos3,
}

impl From<ThumbnailFilter> for FilterType {
    fn from(value: ThumbnailFilter) -> Self {
        match value {
            ThumbnailFilter::Nearest => FilterType::Nearest,
            ThumbnailFilter::Triangle => FilterType::Triangle,
            ThumbnailFilter::CatmullRom => FilterType::CatmullRom,
            ThumbnailFilter::Gaussian => FilterType::Gaussian,
            ThumbnailFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RendererConfig {
    /// Try the GPU path first (false: always render on the CPU)
    #[serde(default = "default_prefer_gpu")]
    pub prefer_gpu: bool,
    #[serde(default)]
    pub power_preference: PowerPreference,
    /// Palette applied to newly created viewers
    #[serde(default)]
    pub default_palette: PaletteType,
    #[serde(default)]
    pub thumbnail_filter: ThumbnailFilter,
    /// tracing filter used when RUST_LOG is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            prefer_gpu: true,
            power_preference: PowerPreference::HighPerformance,
            default_palette: PaletteType::Grayscale,
            thumbnail_filter: ThumbnailFilter::Lanczos3,
            log_filter: default_log_filter(),
        }
    }
}

impl RendererConfig {
    /// CPU-only configuration
    pub fn cpu_only() -> Self {
        Self {
            prefer_gpu: false,
            ..Self::default()
        }
    }

    /// Default location, if the platform has a config directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from the default location
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("dicom-display-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("dicom-display-does-not-exist.json");
        assert_eq!(RendererConfig::load_from(&path).unwrap(), RendererConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let path = temp_config("partial.json", r#"{ "default_palette": "hot", "power_preference": "low" }"#);
        let config = RendererConfig::load_from(&path).unwrap();
        assert_eq!(config.default_palette, PaletteType::Hot);
        assert_eq!(config.power_preference, PowerPreference::LowPower);
        assert!(config.prefer_gpu);
        assert_eq!(config.thumbnail_filter, ThumbnailFilter::Lanczos3);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_full_file() {
        let path = temp_config(
            "full.json",
            r#"{
                "prefer_gpu": false,
                "power_preference": "high_performance",
                "default_palette": "ocean",
                "thumbnail_filter": "catmull_rom",
                "log_filter": "dicom_display=debug"
            }"#,
        );
        let config = RendererConfig::load_from(&path).unwrap();
        assert!(!config.prefer_gpu);
        assert_eq!(config.power_preference, PowerPreference::HighPerformance);
        assert_eq!(FilterType::from(config.thumbnail_filter), FilterType::CatmullRom);
        assert_eq!(config.log_filter, "dicom_display=debug");
    }

    #[test]
    fn test_invalid_file_is_parse_error() {
        let path = temp_config("broken.json", "{ prefer_gpu: nope");
        assert!(matches!(RendererConfig::load_from(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_default_path_layout() {
        if let Some(path) = RendererConfig::default_path() {
            assert!(path.ends_with("dicom-display/config.json"));
        }
    }
}
