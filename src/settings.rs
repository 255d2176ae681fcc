use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::SettingsError;
use crate::gpu::{ClearMask, Viewport};
use crate::shader::DEFAULT_EXTENSIONS;

const PRECISIONS: &[&str] = &["lowp", "mediump", "highp"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RendererSettings {
    #[serde(default = "RendererSettings::default_clear_color")]
    pub clear_color: [f32; 4],
    #[serde(default = "RendererSettings::default_true")]
    pub clear_color_buffer: bool,
    #[serde(default = "RendererSettings::default_true")]
    pub clear_depth_buffer: bool,
    #[serde(default = "RendererSettings::default_device_pixel_ratio")]
    pub device_pixel_ratio: f32,
    #[serde(default = "RendererSettings::default_precision")]
    pub precision: String,
    #[serde(default = "RendererSettings::default_extensions")]
    pub extensions: Vec<String>,
    /// Viewport used until `set_viewport` is called; `None` covers the whole
    /// drawing buffer.
    #[serde(default)]
    pub viewport: Option<ViewportSetting>,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            clear_color: Self::default_clear_color(),
            clear_color_buffer: true,
            clear_depth_buffer: true,
            device_pixel_ratio: Self::default_device_pixel_ratio(),
            precision: Self::default_precision(),
            extensions: Self::default_extensions(),
            viewport: None,
        }
    }
}

impl RendererSettings {
    pub fn load() -> Self {
        #[cfg(target_arch = "wasm32")]
        {
            info!("Using default renderer settings for WebAssembly build");
            return Self::default();
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            Self::load_from_path("renderer.json")
        }
    }

    /// Reads and validates settings, falling back to defaults on any failure.
    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::try_load_from_path(path) {
            Ok(settings) => {
                info!("Loaded renderer settings from {:?}", path);
                settings
            }
            Err(SettingsError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "Renderer settings file {:?} not found. Using default settings.",
                    path
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    "{} ({:?}). Falling back to default renderer settings.",
                    err, path
                );
                Self::default()
            }
        }
    }

    pub fn try_load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self, SettingsError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: RendererSettings = serde_json::from_str(json)?;
        Ok(settings.validate())
    }

    pub fn clear_mask(&self) -> ClearMask {
        let mut mask = ClearMask::empty();
        if self.clear_color_buffer {
            mask |= ClearMask::COLOR;
        }
        if self.clear_depth_buffer {
            mask |= ClearMask::DEPTH;
        }
        mask
    }

    pub fn validate(mut self) -> Self {
        if !(self.device_pixel_ratio.is_finite() && self.device_pixel_ratio > 0.0) {
            warn!("Device pixel ratio must be positive. Using 1.0 instead.");
            self.device_pixel_ratio = Self::default_device_pixel_ratio();
        }

        if !PRECISIONS.contains(&self.precision.as_str()) {
            warn!(
                "Unknown shader precision `{}`. Using `{}`.",
                self.precision,
                Self::default_precision()
            );
            self.precision = Self::default_precision();
        }

        if self.clear_color.iter().any(|c| !c.is_finite()) {
            warn!("Clear color must be finite. Using default clear color.");
            self.clear_color = Self::default_clear_color();
        }

        if let Some(viewport) = &self.viewport {
            if viewport.width == 0 || viewport.height == 0 {
                warn!("Viewport must be larger than zero. Using the full drawing buffer.");
                self.viewport = None;
            }
        }

        self
    }

    const fn default_clear_color() -> [f32; 4] {
        [0.0, 0.0, 0.0, 1.0]
    }

    const fn default_true() -> bool {
        true
    }

    const fn default_device_pixel_ratio() -> f32 {
        1.0
    }

    fn default_precision() -> String {
        "highp".to_string()
    }

    fn default_extensions() -> Vec<String> {
        DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportSetting {
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl From<ViewportSetting> for Viewport {
    fn from(setting: ViewportSetting) -> Self {
        Viewport::new(setting.x, setting.y, setting.width, setting.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid_settings() -> RendererSettings {
        RendererSettings {
            clear_color: [f32::NAN, 0.0, 0.0, 1.0],
            device_pixel_ratio: 0.0,
            precision: "ultra".to_string(),
            viewport: Some(ViewportSetting {
                x: 0,
                y: 0,
                width: 0,
                height: 10,
            }),
            ..RendererSettings::default()
        }
    }

    #[test]
    fn validate_replaces_invalid_values_with_defaults() {
        let validated = invalid_settings().validate();
        let defaults = RendererSettings::default();

        assert_eq!(validated.device_pixel_ratio, defaults.device_pixel_ratio);
        assert_eq!(validated.precision, defaults.precision);
        assert_eq!(validated.clear_color, defaults.clear_color);
        assert_eq!(validated.viewport, None);
    }

    #[test]
    fn validate_preserves_valid_values() {
        let valid = RendererSettings {
            clear_color: [0.2, 0.3, 0.4, 1.0],
            device_pixel_ratio: 2.0,
            precision: "mediump".to_string(),
            viewport: Some(ViewportSetting {
                x: 10,
                y: 20,
                width: 300,
                height: 200,
            }),
            ..RendererSettings::default()
        };

        let validated = valid.clone().validate();
        assert_eq!(validated, valid);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let settings = RendererSettings::from_json(r#"{ "device_pixel_ratio": 2.0 }"#).unwrap();
        assert_eq!(settings.device_pixel_ratio, 2.0);
        assert_eq!(settings.precision, "highp");
        assert_eq!(settings.extensions.len(), DEFAULT_EXTENSIONS.len());
        assert_eq!(settings.clear_mask(), ClearMask::COLOR | ClearMask::DEPTH);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = RendererSettings::from_json("{ not json").unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let settings = RendererSettings::load_from_path("definitely/not/here/renderer.json");
        assert_eq!(settings, RendererSettings::default());
    }
}
