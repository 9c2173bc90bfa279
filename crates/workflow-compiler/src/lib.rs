//! Workflow compiler layer.
//!
//! Sits on top of the observation core: agent actions are recorded against
//! observed nodes, compiled into parameterized step lists with prioritized
//! selectors, cached on disk, and replayed through an [`ActionDriver`] with
//! selector healing when the page drifted since recording. A failed replay
//! reports per-step results so the caller can fall back to exploration.

pub mod cache;
pub mod compiler;
pub mod errors;
pub mod executor;
pub mod healer;
pub mod model;
pub mod recorder;
pub mod selectors;

pub use cache::WorkflowCache;
pub use compiler::WorkflowCompiler;
pub use errors::{Result, WorkflowError};
pub use executor::{ActionDriver, WorkflowExecutor};
pub use model::{
    ActionKind, CompiledWorkflow, ElementTarget, ExecutionResult, ParameterSlot, RecordedAction,
    SelectorStrategy, StepResult, WorkflowStep, WorkflowTrace,
};
pub use recorder::ActionRecorder;
pub use selectors::build_target;
