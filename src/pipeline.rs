use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::commands::arbitrate;
use crate::config::EbrakeConfig;
use crate::overlay;
use crate::safety::SafetyMonitor;
use crate::sim::Environment;
use crate::teleop::{InputSource, OperatorInput};
use crate::vision::Detector;

/// Outcome of one pipeline run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub cycles: u64,
    pub alert_cycles: u64,
    pub final_position: [f64; 3],
}

/// The per-cycle detection-to-safety-decision control loop.
///
/// Each cycle owns its frame, mask, regions and alert state exclusively;
/// nothing is shared across cycles except the explicit debounce counter
/// inside the safety monitor, and nothing runs concurrently with the loop.
pub struct BrakePipeline {
    env: Box<dyn Environment>,
    detector: Detector,
    safety: SafetyMonitor,
    config: EbrakeConfig,
}

impl BrakePipeline {
    pub fn new(env: Box<dyn Environment>, config: EbrakeConfig) -> Self {
        let detector = Detector::new(&config.detection);
        let safety = SafetyMonitor::new(&config.safety);
        Self {
            env,
            detector,
            safety,
            config,
        }
    }

    /// Run the control loop until the operator quits or the episode ends.
    /// The environment is closed on every exit path, including errors.
    pub async fn run(&mut self, input: &mut InputSource) -> Result<RunSummary> {
        let result = self.drive_loop(input).await;

        match self.env.close() {
            Ok(()) => {}
            Err(close_err) if result.is_ok() => {
                return Err(close_err).context("failed to close environment");
            }
            Err(close_err) => {
                warn!("environment close failed after pipeline error: {}", close_err);
            }
        }

        result
    }

    async fn drive_loop(&mut self, input: &mut InputSource) -> Result<RunSummary> {
        if self.config.display.save_annotated {
            tokio::fs::create_dir_all(&self.config.display.output_dir)
                .await
                .context("creating overlay output directory")?;
        }

        let mut frame = self.env.reset().context("environment reset failed")?;
        let mut cycles = 0u64;
        let mut alert_cycles = 0u64;

        loop {
            let outcome = self.detector.detect(&frame)?;
            let assessment = self.safety.assess(&outcome.regions);
            if assessment.alert.is_alert() {
                alert_cycles += 1;
                info!(
                    "ALERT: nearest estimate {:.3} below threshold {:.3}",
                    assessment
                        .estimates
                        .iter()
                        .cloned()
                        .fold(f64::INFINITY, f64::min),
                    self.config.safety.alert_threshold
                );
            }

            // Ground-truth distance from the collaborator's pose, logged for
            // calibration diagnostics only. The safety decision above never
            // sees it.
            let position = self.env.current_position();
            let marker = self.config.environment.marker_position;
            let ground_truth = ((position[0] - marker[0]).powi(2)
                + (position[1] - marker[1]).powi(2)
                + (position[2] - marker[2]).powi(2))
            .sqrt();
            debug!(
                "cycle {}: {} region(s), estimates {:?}, ground-truth distance {:.3}",
                cycles, outcome.regions.len(), assessment.estimates, ground_truth
            );

            // Observational only: annotation never feeds back into control.
            let annotated = overlay::render(&frame, &outcome.regions, assessment.alert);
            if self.config.display.save_annotated {
                let dir = &self.config.display.output_dir;
                annotated
                    .save(format!("{}/cycle_{:05}.png", dir, cycles))
                    .context("saving annotated frame")?;
                outcome
                    .cleaned
                    .save(format!("{}/mask_{:05}.png", dir, cycles))
                    .context("saving cleaned mask")?;
            }

            let requested = match input.next_input().await? {
                OperatorInput::Quit => {
                    info!("exit signal received");
                    break;
                }
                OperatorInput::Drive(cmd) => cmd.command(),
            };

            // Safety-critical: the override is applied before the command
            // reaches the environment, on the only path that reaches step().
            let actuation = arbitrate(requested, assessment.alert);

            let step = self
                .env
                .step(actuation)
                .context("environment step failed")?;
            cycles += 1;

            if step.done {
                info!("episode finished after {} cycles", cycles);
                break;
            }
            frame = step.frame;
        }

        Ok(RunSummary {
            cycles,
            alert_cycles,
            final_position: self.env.current_position(),
        })
    }
}
