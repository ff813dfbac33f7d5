//! Gate Orchestrator: a staged pipeline of named, policy-configured
//! evaluators run against an operation before its receipt is finalized.
//!
//! ## Model
//!
//! - A [`Gate`] exposes `name`, `configure(policy)` and `evaluate(context)`
//!   returning PASS, WARN or BLOCK with reasons.
//! - A [`GateBinding`] selects a gate from the [`GateRegistry`] by name and
//!   binds it to a [`GatePolicy`] and a [`GateScope`]; the same gate can run
//!   under different policies for different operation types or anchor kinds.
//! - A [`GatePipeline`] is an ordered list of stages. Building it configures
//!   every gate, so configuration errors never appear at evaluation time.
//!
//! ## Evaluation
//!
//! Per operation: `Pending → Evaluating → {Pass, Warn, Blocked}`. Gates in a
//! stage run concurrently. A stage blocks if any blocking gate returns BLOCK;
//! evaluation stops at the first blocked stage. Advisory gates never block.

#![deny(unsafe_code)]

pub mod builtin;
pub mod context;
pub mod error;
pub mod orchestrator;
pub mod pipeline;
pub mod policy;
pub mod registry;
pub mod traits;

pub use builtin::{
    ConsentGate, HumanApprovalGate, OperationAllowlistGate, PayloadLimitGate,
    RequiredAttributesGate, StaticGate,
};
pub use context::{Approval, GateStatus, GateVerdict, OperationContext};
pub use error::GateError;
pub use orchestrator::{GateFinding, GateOrchestrator, GateReport, PipelineState, StageReport};
pub use pipeline::{BoundGate, GatePipeline, GatePipelineBuilder, GateStage};
pub use policy::{Enforcement, GateBinding, GatePolicy, GateScope, StageSpec};
pub use registry::GateRegistry;
pub use traits::Gate;
