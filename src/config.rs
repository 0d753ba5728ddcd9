use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EbrakeConfig {
    pub detection: DetectionConfig,
    pub safety: SafetyConfig,
    pub environment: EnvironmentConfig,
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Lower inclusive HSV bound of the marker color (OpenCV scale, H in 0..180)
    pub hsv_lower: [u8; 3],
    /// Upper inclusive HSV bound of the marker color
    pub hsv_upper: [u8; 3],
    /// Minimum bounding-box pixel area; smaller regions are noise
    pub min_area: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    /// Distance calibration constant: focal length times the marker's real
    /// reference height, pre-measured
    pub calibration_c: f64,
    /// Estimated distance below which the alert is raised
    pub alert_threshold: f64,
    /// Consecutive raw-alert cycles required before the alert engages.
    /// 1 reproduces the reference memoryless behavior
    pub debounce_frames: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Which simulated scenario to load
    pub env_name: String,
    /// Which map within the scenario
    pub map_name: String,
    /// World-frame marker position, used only for ground-truth diagnostics
    pub marker_position: [f64; 3],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Save the annotated overlay frame (and cleaned mask) each cycle
    pub save_annotated: bool,
    /// Directory for saved frames
    pub output_dir: String,
}

impl Default for EbrakeConfig {
    fn default() -> Self {
        Self {
            detection: DetectionConfig::default(),
            safety: SafetyConfig::default(),
            environment: EnvironmentConfig::default(),
            display: DisplayConfig::default(),
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            hsv_lower: [10, 200, 150],
            hsv_upper: [35, 255, 255],
            min_area: 2500,
        }
    }
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            calibration_c: 66.0,
            alert_threshold: 0.3,
            debounce_frames: 1,
        }
    }
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            env_name: "marker-road-v0".to_string(),
            map_name: "straight".to_string(),
            marker_position: [2.0, 0.0, 2.0],
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            save_annotated: false,
            output_dir: "frames".to_string(),
        }
    }
}

impl EbrakeConfig {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            // Create default config file
            let default_config = Self::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            fs::write(path, toml_content).await?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(path).await?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployment_calibration() {
        let config = EbrakeConfig::default();
        assert_eq!(config.detection.hsv_lower, [10, 200, 150]);
        assert_eq!(config.detection.hsv_upper, [35, 255, 255]);
        assert_eq!(config.detection.min_area, 2500);
        assert_eq!(config.safety.calibration_c, 66.0);
        assert_eq!(config.safety.alert_threshold, 0.3);
        assert_eq!(config.safety.debounce_frames, 1);
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = EbrakeConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: EbrakeConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.detection.min_area, config.detection.min_area);
        assert_eq!(parsed.environment.env_name, config.environment.env_name);
    }
}
