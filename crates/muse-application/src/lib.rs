//! Use cases for Muse sessions: per-track submission cycles, history edits
//! and the sandbox event pump.

pub mod controller;
pub mod loading;
pub mod orchestrator;
pub mod session;

#[cfg(test)]
mod test_support;

pub use controller::{ControllerDeps, SessionController};
pub use orchestrator::{GenerationOrchestrator, OrchestratorSettings};
pub use session::{Outcome, Phase, SessionState, ViewerState};
