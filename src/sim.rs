use image::{Rgb, RgbImage};
use rand::Rng;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info};

use crate::commands::Command;
use crate::config::EnvironmentConfig;

#[derive(Debug, Error)]
pub enum EnvError {
    #[error("unknown environment: {0}")]
    UnknownEnvironment(String),
    #[error("unknown map: {0}")]
    UnknownMap(String),
    #[error("environment used after close")]
    Closed,
}

/// Result of advancing the simulation one tick. `reward` and `info` are
/// opaque to the braking pipeline.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub frame: RgbImage,
    pub reward: f64,
    pub done: bool,
    pub info: serde_json::Value,
}

/// The external simulation collaborator: produces frames, applies motion
/// commands, and exposes the robot's ground-truth world position for
/// diagnostic logging only.
pub trait Environment {
    fn reset(&mut self) -> Result<RgbImage, EnvError>;
    fn step(&mut self, command: Command) -> Result<StepOutcome, EnvError>;
    fn close(&mut self) -> Result<(), EnvError>;
    fn current_position(&self) -> [f64; 3];
}

const FRAME_WIDTH: u32 = 640;
const FRAME_HEIGHT: u32 = 480;
const MARKER_COLOR: Rgb<u8> = Rgb([200, 150, 20]);
const BACKGROUND: Rgb<u8> = Rgb([85, 85, 85]);
const TICK_SECONDS: f64 = 0.1;
// Apparent marker height in pixels at one distance unit, chosen to match
// the deployment's distance calibration.
const APPARENT_SCALE: f64 = 66.0;
const COLLISION_DISTANCE: f64 = 0.1;

/// Simulated road world with a single fixed yellow marker ahead of the
/// robot. Renders the marker with an apparent pixel height inversely
/// proportional to its distance and integrates simple unicycle kinematics.
pub struct SimEnv {
    position: [f64; 3],
    yaw: f64,
    marker_position: [f64; 3],
    steps: u64,
    closed: bool,
    noise: bool,
}

impl SimEnv {
    pub fn new(config: &EnvironmentConfig) -> Result<Self, EnvError> {
        if !config.env_name.contains("marker-road") {
            return Err(EnvError::UnknownEnvironment(config.env_name.clone()));
        }
        let start = match config.map_name.as_str() {
            "straight" => [0.0, 0.0, 2.0],
            "close" => [1.3, 0.0, 2.0],
            other => return Err(EnvError::UnknownMap(other.to_string())),
        };

        info!(
            "simulated environment {} / map {} ready",
            config.env_name, config.map_name
        );

        Ok(Self {
            position: start,
            yaw: 0.0,
            marker_position: config.marker_position,
            steps: 0,
            closed: false,
            noise: true,
        })
    }

    /// Disable per-pixel background noise. Used by deterministic tests.
    pub fn without_noise(mut self) -> Self {
        self.noise = false;
        self
    }

    pub fn marker_distance(&self) -> f64 {
        let dx = self.position[0] - self.marker_position[0];
        let dy = self.position[1] - self.marker_position[1];
        let dz = self.position[2] - self.marker_position[2];
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    fn render_frame(&self) -> RgbImage {
        let mut frame = RgbImage::from_pixel(FRAME_WIDTH, FRAME_HEIGHT, BACKGROUND);

        if self.noise {
            let mut rng = rand::thread_rng();
            for pixel in frame.pixels_mut() {
                let jitter: i16 = rng.gen_range(-5..=5);
                for c in 0..3 {
                    pixel[c] = (pixel[c] as i16 + jitter).clamp(0, 255) as u8;
                }
            }
        }

        // Heading vector in the x/z ground plane; the marker is only drawn
        // when it lies ahead of the robot.
        let to_marker = [
            self.marker_position[0] - self.position[0],
            self.marker_position[2] - self.position[2],
        ];
        let heading = [self.yaw.cos(), self.yaw.sin()];
        let ahead = to_marker[0] * heading[0] + to_marker[1] * heading[1];
        if ahead <= 0.0 {
            return frame;
        }

        let distance = self.marker_distance().max(COLLISION_DISTANCE);
        let apparent_height = (APPARENT_SCALE / distance)
            .round()
            .min((FRAME_HEIGHT - 10) as f64) as u32;
        if apparent_height == 0 {
            return frame;
        }
        let apparent_width = (apparent_height as f64 * 0.8).round().max(1.0) as u32;

        // Horizontal placement follows the bearing to the marker.
        let bearing = to_marker[1].atan2(to_marker[0]) - self.yaw;
        let center_x = (FRAME_WIDTH as f64 / 2.0 + bearing * 300.0).round() as i64;
        let center_y = (FRAME_HEIGHT as f64 * 0.55).round() as i64;

        let x0 = center_x - apparent_width as i64 / 2;
        let y0 = center_y - apparent_height as i64 / 2;
        for dy in 0..apparent_height as i64 {
            for dx in 0..apparent_width as i64 {
                let (x, y) = (x0 + dx, y0 + dy);
                if x >= 0 && y >= 0 && (x as u32) < FRAME_WIDTH && (y as u32) < FRAME_HEIGHT {
                    frame.put_pixel(x as u32, y as u32, MARKER_COLOR);
                }
            }
        }

        frame
    }
}

impl Environment for SimEnv {
    fn reset(&mut self) -> Result<RgbImage, EnvError> {
        if self.closed {
            return Err(EnvError::Closed);
        }
        self.steps = 0;
        debug!(
            "environment reset, marker at distance {:.3}",
            self.marker_distance()
        );
        Ok(self.render_frame())
    }

    fn step(&mut self, command: Command) -> Result<StepOutcome, EnvError> {
        if self.closed {
            return Err(EnvError::Closed);
        }

        self.position[0] += command.linear * self.yaw.cos() * TICK_SECONDS;
        self.position[2] += command.linear * self.yaw.sin() * TICK_SECONDS;
        self.yaw += command.angular * TICK_SECONDS;
        self.steps += 1;

        let distance = self.marker_distance();
        let done = distance < COLLISION_DISTANCE;
        let reward = if done { -10.0 } else { -0.01 };

        debug!(
            "step {}: linear {:.2} angular {:.2}, marker distance {:.3}",
            self.steps, command.linear, command.angular, distance
        );

        Ok(StepOutcome {
            frame: self.render_frame(),
            reward,
            done,
            info: json!({ "steps": self.steps, "collision": done }),
        })
    }

    fn close(&mut self) -> Result<(), EnvError> {
        if self.closed {
            return Err(EnvError::Closed);
        }
        self.closed = true;
        info!("simulated environment closed after {} steps", self.steps);
        Ok(())
    }

    fn current_position(&self) -> [f64; 3] {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectionConfig;
    use crate::vision::Detector;

    fn sim(map: &str) -> SimEnv {
        SimEnv::new(&EnvironmentConfig {
            env_name: "marker-road-v0".to_string(),
            map_name: map.to_string(),
            marker_position: [2.0, 0.0, 2.0],
        })
        .unwrap()
        .without_noise()
    }

    #[test]
    fn unknown_environment_is_rejected() {
        let err = SimEnv::new(&EnvironmentConfig {
            env_name: "lunar-lander".to_string(),
            map_name: "straight".to_string(),
            marker_position: [2.0, 0.0, 2.0],
        });
        assert!(matches!(err, Err(EnvError::UnknownEnvironment(_))));
    }

    #[test]
    fn reset_produces_full_frame() {
        let mut env = sim("straight");
        let frame = env.reset().unwrap();
        assert_eq!(frame.dimensions(), (640, 480));
    }

    #[test]
    fn forward_steps_approach_the_marker() {
        let mut env = sim("straight");
        env.reset().unwrap();
        let before = env.marker_distance();
        env.step(Command::new(1.0, 0.0)).unwrap();
        assert!(env.marker_distance() < before);
    }

    #[test]
    fn marker_grows_as_robot_approaches() {
        let mut env = sim("straight");
        env.reset().unwrap();
        let detector = Detector::new(&DetectionConfig::default());

        // Drive close enough that the marker clears the area filter.
        let mut last = None;
        for _ in 0..12 {
            let outcome = env.step(Command::new(1.0, 0.0)).unwrap();
            last = Some(outcome.frame);
        }
        let regions = detector.detect(&last.unwrap()).unwrap().regions;
        assert_eq!(regions.len(), 1);
        assert!(regions[0].height > 50);
    }

    #[test]
    fn collision_terminates_the_episode() {
        let mut env = sim("close");
        env.reset().unwrap();
        let mut done = false;
        for _ in 0..20 {
            let outcome = env.step(Command::new(1.0, 0.0)).unwrap();
            if outcome.done {
                done = true;
                break;
            }
        }
        assert!(done);
    }

    #[test]
    fn use_after_close_is_an_error() {
        let mut env = sim("straight");
        env.reset().unwrap();
        env.close().unwrap();
        assert!(matches!(env.step(Command::STOP), Err(EnvError::Closed)));
        assert!(matches!(env.close(), Err(EnvError::Closed)));
    }
}
