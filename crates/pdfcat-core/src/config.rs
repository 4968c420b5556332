// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration: defaults for every watermark and compression
// control, plus serializer tuning.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::types::{CompressionSpec, Placement, WatermarkKind, WatermarkSettings};

/// Persistent application settings.
///
/// Every field has a default so partial JSON files are accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Watermark variant selected on start.
    pub watermark_kind: WatermarkKind,
    /// Default watermark text.
    pub watermark_text: String,
    /// Text size in points (10–200).
    pub font_size: f32,
    /// Image size as a percentage of the baseline (10–200).
    pub image_scale_percent: f32,
    /// Opacity, rotation, and position shared by both variants.
    pub placement: Placement,
    /// Rasterizing compression defaults.
    pub compression: CompressionSpec,
    /// Prune, renumber, and Flate-compress objects when saving.
    pub compact_object_layout: bool,
    /// Objects written between cooperative yields while saving.
    pub save_batch_size: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        let settings = WatermarkSettings::default();
        Self {
            watermark_kind: settings.kind,
            watermark_text: settings.text,
            font_size: settings.font_size,
            image_scale_percent: settings.image_scale_percent,
            placement: settings.placement,
            compression: CompressionSpec::default(),
            compact_object_layout: true,
            save_batch_size: 50,
        }
    }
}

impl AppConfig {
    /// Read a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&data)?;
        debug!(path = %path.as_ref().display(), "config loaded");
        Ok(config)
    }

    /// Read a JSON config file, falling back to defaults if it is missing or
    /// unreadable.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path.as_ref()) {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %path.as_ref().display(), %err, "using default config");
                Self::default()
            }
        }
    }

    /// Write the config as pretty JSON.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// Initial watermark settings for a new preview session.
    pub fn watermark_settings(&self) -> WatermarkSettings {
        WatermarkSettings {
            kind: self.watermark_kind,
            text: self.watermark_text.clone(),
            font_size: self.font_size,
            image: None,
            image_scale_percent: self.image_scale_percent,
            placement: self.placement,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pdfcat.json");
        std::fs::write(&path, r#"{ "watermark_text": "DRAFT", "font_size": 42 }"#).unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.watermark_text, "DRAFT");
        assert_eq!(config.font_size, 42.0);
        assert_eq!(config.placement, Placement::default());
        assert_eq!(config.save_batch_size, 50);
    }

    #[test]
    fn persist_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pdfcat.json");
        let mut config = AppConfig::default();
        config.compression.target_max_bytes = Some(500_000);
        config.persist(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.compression.target_max_bytes, Some(500_000));
    }

    #[test]
    fn missing_file_uses_defaults() {
        let config = AppConfig::load_or_default("/nonexistent/pdfcat.json");
        assert_eq!(config.watermark_text, "CONFIDENTIAL");
        assert_eq!(config.watermark_settings().font_size, 80.0);
    }
}
