use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::{RefineOptions, VerdictThresholds};
use crate::detection::preprocessing::Polarity;
use crate::detection::{DarkSpotRefiner, ThresholdDetector};

pub const DEFAULT_CONFIG_FILE: &str = "annomeasure.toml";

/// Run settings, read from a TOML file. Every key is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub paths: PathSettings,
    pub detection: DetectionSettings,
    pub refine: RefineSettings,
    pub verify: VerifySettings,
    pub flags: FlagSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub image_folder: PathBuf,
    /// The annotation document
    pub document: PathBuf,
    pub output_visual_folder: PathBuf,
    pub debug_folder: Option<PathBuf>,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            image_folder: PathBuf::from("images"),
            document: PathBuf::from("annotations.json"),
            output_visual_folder: PathBuf::from("output_results"),
            debug_folder: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    pub class_label: String,
    pub blur_sigma: f32,
    /// Fixed threshold; Otsu when absent
    pub threshold: Option<u8>,
    pub foreground: Polarity,
    pub min_area: u32,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        let d = ThresholdDetector::default();
        Self {
            class_label: d.class_label,
            blur_sigma: d.blur_sigma,
            threshold: d.threshold,
            foreground: d.polarity,
            min_area: d.min_area,
        }
    }
}

impl DetectionSettings {
    pub fn build_detector(&self) -> ThresholdDetector {
        ThresholdDetector {
            blur_sigma: self.blur_sigma,
            threshold: self.threshold,
            polarity: self.foreground,
            min_area: self.min_area,
            class_label: self.class_label.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineSettings {
    pub prompt: String,
    pub retry_empty: bool,
    pub dark_threshold: u8,
    pub min_area: u32,
}

impl Default for RefineSettings {
    fn default() -> Self {
        let opts = RefineOptions::default();
        let refiner = DarkSpotRefiner::default();
        Self {
            prompt: opts.prompt,
            retry_empty: opts.retry_empty,
            dark_threshold: refiner.dark_threshold,
            min_area: refiner.min_area,
        }
    }
}

impl RefineSettings {
    pub fn build_refiner(&self) -> DarkSpotRefiner {
        DarkSpotRefiner {
            dark_threshold: self.dark_threshold,
            min_area: self.min_area,
        }
    }

    pub fn options(&self, debug_dir: Option<PathBuf>) -> RefineOptions {
        RefineOptions {
            prompt: self.prompt.clone(),
            retry_empty: self.retry_empty,
            debug_dir,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifySettings {
    pub ground_truth: PathBuf,
    #[serde(flatten)]
    pub thresholds: VerdictThresholds,
}

impl Default for VerifySettings {
    fn default() -> Self {
        Self {
            ground_truth: PathBuf::from("ground_truth.csv"),
            thresholds: VerdictThresholds::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlagSettings {
    pub write_visuals: bool,
    /// Seed for overlay class colors
    pub palette_seed: u64,
}

impl Default for FlagSettings {
    fn default() -> Self {
        Self {
            write_visuals: true,
            palette_seed: 0x5eed,
        }
    }
}

impl Settings {
    /// Read settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {:?}", path))?;
        Self::from_toml(&text).with_context(|| format!("Invalid config {:?}", path))
    }

    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }
}
