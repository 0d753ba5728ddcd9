use std::collections::VecDeque;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::debug;

use crate::commands::OperatorCommand;

/// One operator input: either a drive request or the exit signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorInput {
    Drive(OperatorCommand),
    Quit,
}

/// Parse one line of operator input. `x` or `quit` terminates the loop;
/// otherwise the first character selects a command, with unrecognized
/// input resolving to the no-op hold command.
pub fn parse_input(line: &str) -> OperatorInput {
    let trimmed = line.trim();
    if trimmed.eq_ignore_ascii_case("x") || trimmed.eq_ignore_ascii_case("quit") {
        return OperatorInput::Quit;
    }
    let key = trimmed.chars().next().unwrap_or(' ');
    OperatorInput::Drive(OperatorCommand::from_key(key))
}

/// Blocking source of per-cycle operator inputs. Interactive mode reads
/// stdin lines; scripted mode replays a fixed sequence and then quits,
/// which drives the demo and the integration tests.
pub enum InputSource {
    Interactive(Lines<BufReader<Stdin>>),
    Script(VecDeque<OperatorInput>),
}

impl InputSource {
    pub fn interactive() -> Self {
        InputSource::Interactive(BufReader::new(tokio::io::stdin()).lines())
    }

    pub fn script(inputs: impl IntoIterator<Item = OperatorInput>) -> Self {
        InputSource::Script(inputs.into_iter().collect())
    }

    /// A forward-driving demo script.
    pub fn demo(cycles: usize) -> Self {
        Self::script(std::iter::repeat(OperatorInput::Drive(OperatorCommand::Forward)).take(cycles))
    }

    pub async fn next_input(&mut self) -> Result<OperatorInput> {
        match self {
            InputSource::Interactive(lines) => {
                let input = match lines.next_line().await? {
                    Some(line) => parse_input(&line),
                    // stdin closed: treat as the exit signal
                    None => OperatorInput::Quit,
                };
                debug!("operator input: {:?}", input);
                Ok(input)
            }
            InputSource::Script(queue) => Ok(queue.pop_front().unwrap_or(OperatorInput::Quit)),
        }
    }
}
