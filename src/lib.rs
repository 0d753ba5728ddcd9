pub mod commands;
pub mod config;
pub mod overlay;
pub mod pipeline;
pub mod safety;
pub mod sim;
pub mod teleop;
pub mod vision;

pub use commands::{arbitrate, Command, OperatorCommand};
pub use safety::AlertState;
pub use vision::BoundingBox;
