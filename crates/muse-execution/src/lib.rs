//! Sandbox execution: the host-side channel and the in-process sandbox actor.

pub mod channel;
pub mod local_sandbox;
pub mod runtime;

pub use channel::{Disposition, SandboxChannel, SandboxEvents};
pub use local_sandbox::LocalSandboxLauncher;
pub use runtime::{HeadlessRuntime, SceneRuntime};
