pub mod config;
pub mod decomposer;
pub mod dispatch;
pub mod error;
pub mod info_gathering;
pub mod orchestrator;
pub mod parse;
pub mod ports;
pub mod process;
pub mod review;
pub mod subtask_runner;
pub mod validation;

pub use error::{FormatError, OrchestrationError};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use ports::{ConfirmationPort, Ports, ReasoningPort, ToolOutcome, ToolPort};
