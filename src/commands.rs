use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::safety::AlertState;

/// Operator motion request for one cycle: linear and angular velocity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub linear: f64,
    pub angular: f64,
}

impl Command {
    pub const STOP: Command = Command {
        linear: 0.0,
        angular: 0.0,
    };

    pub fn new(linear: f64, angular: f64) -> Self {
        Self { linear, angular }
    }
}

/// Recognized operator commands, checked exhaustively. Anything the
/// operator sends that is not recognized maps to `Hold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    Forward,
    Backward,
    TurnLeft,
    TurnRight,
    ForwardLeft,
    ForwardRight,
    Hold,
}

impl OperatorCommand {
    pub fn from_key(key: char) -> Self {
        match key.to_ascii_lowercase() {
            'w' => OperatorCommand::Forward,
            's' => OperatorCommand::Backward,
            'a' => OperatorCommand::TurnLeft,
            'd' => OperatorCommand::TurnRight,
            'q' => OperatorCommand::ForwardLeft,
            'e' => OperatorCommand::ForwardRight,
            _ => OperatorCommand::Hold,
        }
    }

    pub fn command(&self) -> Command {
        match self {
            OperatorCommand::Forward => Command::new(1.0, 0.0),
            OperatorCommand::Backward => Command::new(-1.0, 0.0),
            OperatorCommand::TurnLeft => Command::new(0.0, 1.0),
            OperatorCommand::TurnRight => Command::new(0.0, -1.0),
            OperatorCommand::ForwardLeft => Command::new(0.3, 1.0),
            OperatorCommand::ForwardRight => Command::new(0.3, -1.0),
            OperatorCommand::Hold => Command::STOP,
        }
    }
}

/// The safety interlock. While the alert is raised, no positive linear
/// velocity may reach the environment: forward motion is forced to zero and
/// angular velocity is preserved, so the operator can still turn away.
/// Must run before every `Environment::step`.
pub fn arbitrate(requested: Command, alert: AlertState) -> Command {
    if alert.is_alert() && requested.linear > 0.0 {
        debug!(
            "interlock engaged: blocking forward velocity {:.2}",
            requested.linear
        );
        Command::new(0.0, requested.angular)
    } else {
        requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_blocks_all_forward_commands() {
        let forwards = [
            Command::new(1.0, 0.0),
            Command::new(0.3, 1.0),
            Command::new(0.3, -1.0),
            Command::new(0.001, 0.5),
            Command::new(10.0, -2.0),
        ];
        for requested in forwards {
            let actual = arbitrate(requested, AlertState::Alert);
            assert_eq!(actual.linear, 0.0);
            assert_eq!(actual.angular, requested.angular);
        }
    }

    #[test]
    fn alert_preserves_non_forward_commands() {
        let non_forward = [
            Command::new(-1.0, 0.0),
            Command::new(0.0, 1.0),
            Command::new(0.0, -1.0),
            Command::STOP,
        ];
        for requested in non_forward {
            assert_eq!(arbitrate(requested, AlertState::Alert), requested);
        }
    }

    #[test]
    fn clear_passes_commands_unchanged() {
        let commands = [
            Command::new(1.0, 0.0),
            Command::new(-1.0, 0.0),
            Command::new(0.3, 1.0),
            Command::STOP,
        ];
        for requested in commands {
            assert_eq!(arbitrate(requested, AlertState::Clear), requested);
        }
    }

    #[test]
    fn key_mapping_matches_reference_bindings() {
        assert_eq!(
            OperatorCommand::from_key('w').command(),
            Command::new(1.0, 0.0)
        );
        assert_eq!(
            OperatorCommand::from_key('s').command(),
            Command::new(-1.0, 0.0)
        );
        assert_eq!(
            OperatorCommand::from_key('a').command(),
            Command::new(0.0, 1.0)
        );
        assert_eq!(
            OperatorCommand::from_key('d').command(),
            Command::new(0.0, -1.0)
        );
        assert_eq!(
            OperatorCommand::from_key('q').command(),
            Command::new(0.3, 1.0)
        );
        assert_eq!(
            OperatorCommand::from_key('e').command(),
            Command::new(0.3, -1.0)
        );
    }

    #[test]
    fn unrecognized_keys_map_to_hold() {
        for key in ['z', '7', ' ', '#'] {
            assert_eq!(OperatorCommand::from_key(key), OperatorCommand::Hold);
            assert_eq!(OperatorCommand::from_key(key).command(), Command::STOP);
        }
    }
}
