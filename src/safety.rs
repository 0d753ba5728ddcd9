use tracing::debug;

use crate::config::SafetyConfig;
use crate::vision::BoundingBox;

/// Per-cycle safety flag gating forward motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertState {
    Clear,
    Alert,
}

impl AlertState {
    pub fn is_alert(&self) -> bool {
        matches!(self, AlertState::Alert)
    }
}

/// Monocular distance estimate from apparent pixel height:
/// `distance = C / height`, with C the pre-measured product of focal length
/// and the marker's real reference height. A zero-height box yields no
/// estimate rather than a division by zero.
pub fn estimate_distance(region: &BoundingBox, calibration_c: f64) -> Option<f64> {
    if region.height == 0 {
        return None;
    }
    Some(calibration_c / region.height as f64)
}

/// Existential alert rule: any estimate below the threshold raises the alert.
pub fn evaluate_estimates(estimates: &[f64], threshold: f64) -> AlertState {
    if estimates.iter().any(|d| *d < threshold) {
        AlertState::Alert
    } else {
        AlertState::Clear
    }
}

/// One cycle's safety evaluation.
#[derive(Debug, Clone)]
pub struct Assessment {
    pub estimates: Vec<f64>,
    pub alert: AlertState,
}

/// Evaluates distance estimates against the alert threshold each cycle.
///
/// With `debounce_frames = 1` (the default) the decision is memoryless: it
/// depends only on the current cycle's detections, with no hysteresis or
/// minimum dwell time. A larger window delays alert onset until that many
/// consecutive raw-alert cycles have been seen; release is never delayed,
/// so the debounce only filters single-frame false positives and cannot
/// hold the interlock open on a hazard.
pub struct SafetyMonitor {
    calibration_c: f64,
    alert_threshold: f64,
    debounce_frames: usize,
    consecutive_raw_alerts: usize,
}

impl SafetyMonitor {
    pub fn new(config: &SafetyConfig) -> Self {
        Self {
            calibration_c: config.calibration_c,
            alert_threshold: config.alert_threshold,
            debounce_frames: config.debounce_frames.max(1),
            consecutive_raw_alerts: 0,
        }
    }

    pub fn assess(&mut self, regions: &[BoundingBox]) -> Assessment {
        let mut estimates = Vec::with_capacity(regions.len());
        for region in regions {
            if let Some(estimate) = estimate_distance(region, self.calibration_c) {
                debug!(
                    "region height {} px -> estimated distance {:.3}",
                    region.height, estimate
                );
                estimates.push(estimate);
            }
        }

        let raw = evaluate_estimates(&estimates, self.alert_threshold);
        if raw.is_alert() {
            self.consecutive_raw_alerts += 1;
        } else {
            self.consecutive_raw_alerts = 0;
        }

        let alert = if raw.is_alert() && self.consecutive_raw_alerts >= self.debounce_frames {
            AlertState::Alert
        } else {
            AlertState::Clear
        };

        Assessment { estimates, alert }
    }
}
