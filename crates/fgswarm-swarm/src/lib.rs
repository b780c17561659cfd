//! Focus-group swarm: four scripted agents threaded through one shared context.
//!
//! Each [`SwarmAgent`] pairs an instruction text with the closed set of
//! [`StageOp`]s it may invoke. The [`Swarm`] driver lets the oracle drive the
//! active agent's turns, applies requested operations to the
//! [`SharedContext`], and consults the [`HandoffTable`] when the agent is done.

pub mod agent;
pub mod context;
pub mod handoff;
pub mod pipeline;
pub mod prompts;
pub mod run_log;
pub mod stage;
pub mod swarm;

pub use agent::SwarmAgent;
pub use context::{ContextField, SharedContext};
pub use handoff::{HandoffCondition, HandoffRule, HandoffTable, HandoffTarget, Transition};
pub use pipeline::{FocusGroupPipeline, PipelineStage};
pub use run_log::RunLogger;
pub use stage::{StageCall, StageIo, StageOp, StageResult};
pub use swarm::{AgentRun, Swarm, SwarmOutcome};
