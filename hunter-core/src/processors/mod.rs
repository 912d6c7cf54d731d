//! Event processors.
//!
//! - `ParticipationProcessor`: handles one participation row
//! - `HuntOrchestrator`: owns the participation query and feeds its rows,
//!   one at a time, to a `ParticipationProcessor`

pub mod hunt_orchestrator;
pub mod participation;

pub use hunt_orchestrator::{HuntOrchestrator, OrchestratorConfig, StartupError};
pub use participation::{ParticipationProcessor, ProcessError, RowOutcome};
