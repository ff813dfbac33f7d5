use std::collections::HashSet;

use crate::error::GateError;
use crate::policy::{Enforcement, GateBinding, GateScope, StageSpec};
use crate::registry::GateRegistry;
use crate::traits::Gate;

/// A configured gate instance inside a stage.
pub struct BoundGate {
    pub(crate) gate: Box<dyn Gate>,
    pub(crate) policy_id: String,
    pub(crate) enforcement: Enforcement,
    pub(crate) scope: GateScope,
}

impl BoundGate {
    pub fn name(&self) -> &str {
        self.gate.name()
    }

    pub fn policy_id(&self) -> &str {
        &self.policy_id
    }

    pub fn enforcement(&self) -> Enforcement {
        self.enforcement
    }
}

/// One ordered stage of gates, evaluated together.
pub struct GateStage {
    pub(crate) name: String,
    pub(crate) gates: Vec<BoundGate>,
}

impl GateStage {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn gates(&self) -> &[BoundGate] {
        &self.gates
    }
}

/// An immutable, fully configured sequence of stages.
///
/// Building a pipeline instantiates and configures every gate, so unknown
/// gate names and malformed policies surface here and never during
/// evaluation.
#[derive(Default)]
pub struct GatePipeline {
    pub(crate) stages: Vec<GateStage>,
}

impl GatePipeline {
    /// A pipeline with no stages; every operation passes.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builder(registry: &GateRegistry) -> GatePipelineBuilder<'_> {
        GatePipelineBuilder {
            registry,
            stages: Vec::new(),
        }
    }

    pub fn from_specs(registry: &GateRegistry, specs: &[StageSpec]) -> Result<Self, GateError> {
        specs
            .iter()
            .fold(Self::builder(registry), |b, spec| {
                b.stage(spec.name.clone(), spec.gates.clone())
            })
            .build()
    }

    pub fn stages(&self) -> &[GateStage] {
        &self.stages
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl std::fmt::Debug for GatePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stages: Vec<(&str, Vec<&str>)> = self
            .stages
            .iter()
            .map(|s| (s.name(), s.gates.iter().map(BoundGate::name).collect()))
            .collect();
        f.debug_struct("GatePipeline").field("stages", &stages).finish()
    }
}

pub struct GatePipelineBuilder<'r> {
    registry: &'r GateRegistry,
    stages: Vec<StageSpec>,
}

impl<'r> GatePipelineBuilder<'r> {
    /// Append a stage. Validation is deferred to [`GatePipelineBuilder::build`].
    pub fn stage(mut self, name: impl Into<String>, gates: Vec<GateBinding>) -> Self {
        self.stages.push(StageSpec {
            name: name.into(),
            gates,
        });
        self
    }

    pub fn build(self) -> Result<GatePipeline, GateError> {
        let mut seen = HashSet::new();
        let mut stages = Vec::with_capacity(self.stages.len());

        for spec in self.stages {
            if spec.name.trim().is_empty() {
                return Err(GateError::InvalidPipeline("stage name must not be empty".into()));
            }
            if !seen.insert(spec.name.clone()) {
                return Err(GateError::InvalidPipeline(format!(
                    "duplicate stage name: {}",
                    spec.name
                )));
            }
            if spec.gates.is_empty() {
                return Err(GateError::InvalidPipeline(format!(
                    "stage {} has no gates",
                    spec.name
                )));
            }

            let mut gates = Vec::with_capacity(spec.gates.len());
            for binding in spec.gates {
                let gate = self.registry.instantiate(&binding.gate, &binding.policy)?;
                gates.push(BoundGate {
                    gate,
                    policy_id: binding.policy.policy_id,
                    enforcement: binding.policy.enforcement,
                    scope: binding.scope,
                });
            }
            stages.push(GateStage {
                name: spec.name,
                gates,
            });
        }

        Ok(GatePipeline { stages })
    }
}
