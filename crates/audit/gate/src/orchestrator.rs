use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use maple_audit_types::OperationId;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::context::{GateStatus, OperationContext};
use crate::pipeline::{BoundGate, GatePipeline};
use crate::policy::Enforcement;

/// Per-operation orchestration state.
///
/// `Pending → Evaluating → {Pass, Warn, Blocked}`; the last three are
/// terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Pending,
    Evaluating,
    Pass,
    Warn,
    Blocked,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Pass | PipelineState::Warn | PipelineState::Blocked
        )
    }

    pub fn can_transition_to(&self, next: PipelineState) -> bool {
        matches!(
            (self, next),
            (PipelineState::Pending, PipelineState::Evaluating)
                | (PipelineState::Evaluating, PipelineState::Pass)
                | (PipelineState::Evaluating, PipelineState::Warn)
                | (PipelineState::Evaluating, PipelineState::Blocked)
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineState::Pending => "pending",
            PipelineState::Evaluating => "evaluating",
            PipelineState::Pass => "pass",
            PipelineState::Warn => "warn",
            PipelineState::Blocked => "blocked",
        };
        f.write_str(s)
    }
}

/// What one gate decided, after enforcement was applied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateFinding {
    pub gate: String,
    pub policy_id: String,
    pub enforcement: Enforcement,
    /// Effective status: an advisory BLOCK is recorded as WARN.
    pub status: GateStatus,
    /// Status the gate itself reported.
    pub reported: GateStatus,
    pub reasons: Vec<String>,
}

impl GateFinding {
    pub fn is_blocking(&self) -> bool {
        self.status == GateStatus::Block
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: String,
    pub status: GateStatus,
    pub findings: Vec<GateFinding>,
}

/// Outcome of running the pipeline for one operation.
///
/// Enough to reproduce the decision: every finding names its gate and
/// policy id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateReport {
    pub operation_id: OperationId,
    pub state: PipelineState,
    /// States visited, starting at `Pending`.
    pub history: Vec<PipelineState>,
    pub stages: Vec<StageReport>,
}

impl GateReport {
    fn new(operation_id: OperationId) -> Self {
        Self {
            operation_id,
            state: PipelineState::Pending,
            history: vec![PipelineState::Pending],
            stages: Vec::new(),
        }
    }

    fn transition(&mut self, next: PipelineState) {
        debug_assert!(self.state.can_transition_to(next));
        debug!(
            operation_id = %self.operation_id,
            from = %self.state,
            to = %next,
            "Gate pipeline transition"
        );
        self.state = next;
        self.history.push(next);
    }

    pub fn is_blocked(&self) -> bool {
        self.state == PipelineState::Blocked
    }

    pub fn findings(&self) -> impl Iterator<Item = &GateFinding> {
        self.stages.iter().flat_map(|s| s.findings.iter())
    }

    /// Findings that blocked the operation.
    pub fn blocking_findings(&self) -> Vec<&GateFinding> {
        self.findings().filter(|f| f.is_blocking()).collect()
    }

    /// WARN findings carried for audit.
    pub fn warnings(&self) -> Vec<&GateFinding> {
        self.findings()
            .filter(|f| f.status == GateStatus::Warn)
            .collect()
    }

    /// Stage that blocked, if any.
    pub fn blocked_stage(&self) -> Option<&str> {
        self.stages
            .iter()
            .find(|s| s.status == GateStatus::Block)
            .map(|s| s.stage.as_str())
    }
}

/// Runs a [`GatePipeline`] against operation contexts.
#[derive(Clone, Debug)]
pub struct GateOrchestrator {
    pipeline: Arc<GatePipeline>,
}

impl GateOrchestrator {
    pub fn new(pipeline: GatePipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }

    pub fn pipeline(&self) -> &GatePipeline {
        &self.pipeline
    }

    /// Evaluate every stage in order, stopping at the first blocked stage.
    ///
    /// Gates of a stage run concurrently. Within a stage, a blocking gate
    /// that returns BLOCK, or fails to evaluate, blocks the stage; advisory
    /// gates can only warn.
    pub async fn evaluate(&self, ctx: &OperationContext) -> GateReport {
        let mut report = GateReport::new(ctx.operation_id.clone());
        report.transition(PipelineState::Evaluating);

        for stage in self.pipeline.stages() {
            let applicable: Vec<&BoundGate> = stage
                .gates()
                .iter()
                .filter(|g| g.scope.applies_to(ctx))
                .collect();

            debug!(
                operation_id = %ctx.operation_id,
                stage = stage.name(),
                gates = applicable.len(),
                "Evaluating stage"
            );

            let findings = join_all(applicable.into_iter().map(|g| evaluate_gate(g, ctx))).await;
            let status = stage_status(&findings);
            let blocked = status == GateStatus::Block;

            if blocked {
                for f in findings.iter().filter(|f| f.is_blocking()) {
                    warn!(
                        operation_id = %ctx.operation_id,
                        stage = stage.name(),
                        gate = %f.gate,
                        policy_id = %f.policy_id,
                        reasons = ?f.reasons,
                        "Gate blocked operation"
                    );
                }
            }

            report.stages.push(StageReport {
                stage: stage.name().to_string(),
                status,
                findings,
            });

            if blocked {
                report.transition(PipelineState::Blocked);
                return report;
            }
        }

        let final_state = if report.warnings().is_empty() {
            PipelineState::Pass
        } else {
            PipelineState::Warn
        };
        report.transition(final_state);
        info!(
            operation_id = %ctx.operation_id,
            state = %final_state,
            stages = report.stages.len(),
            "Gate pipeline completed"
        );
        report
    }
}

async fn evaluate_gate(bound: &BoundGate, ctx: &OperationContext) -> GateFinding {
    let (reported, reasons) = match bound.gate.evaluate(ctx).await {
        Ok(verdict) => (verdict.status, verdict.reasons),
        Err(e) => {
            warn!(gate = bound.name(), error = %e, "Gate evaluation failed");
            (GateStatus::Block, vec![format!("evaluation failed: {}", e)])
        }
    };

    let status = match (reported, bound.enforcement) {
        (GateStatus::Block, Enforcement::Advisory) => GateStatus::Warn,
        (s, _) => s,
    };

    debug!(
        gate = bound.name(),
        policy_id = %bound.policy_id,
        reported = %reported,
        effective = %status,
        "Gate evaluated"
    );

    GateFinding {
        gate: bound.name().to_string(),
        policy_id: bound.policy_id.clone(),
        enforcement: bound.enforcement,
        status,
        reported,
        reasons,
    }
}

fn stage_status(findings: &[GateFinding]) -> GateStatus {
    findings
        .iter()
        .map(|f| f.status)
        .max()
        .unwrap_or(GateStatus::Pass)
}
