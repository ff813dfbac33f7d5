use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::builtin::{
    ConsentGate, HumanApprovalGate, OperationAllowlistGate, PayloadLimitGate,
    RequiredAttributesGate, StaticGate,
};
use crate::error::GateError;
use crate::policy::GatePolicy;
use crate::traits::Gate;

type GateFactory = Arc<dyn Fn() -> Box<dyn Gate> + Send + Sync>;

/// Name → gate factory. The single place gate implementations are selected
/// from configuration.
#[derive(Clone, Default)]
pub struct GateRegistry {
    factories: BTreeMap<String, GateFactory>,
}

impl GateRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the generic built-in gates.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.insert(StaticGate::NAME, || Box::new(StaticGate::new()));
        registry.insert(RequiredAttributesGate::NAME, || {
            Box::<RequiredAttributesGate>::default()
        });
        registry.insert(PayloadLimitGate::NAME, || Box::<PayloadLimitGate>::default());
        registry.insert(OperationAllowlistGate::NAME, || {
            Box::<OperationAllowlistGate>::default()
        });
        registry.insert(ConsentGate::NAME, || Box::<ConsentGate>::default());
        registry.insert(HumanApprovalGate::NAME, || Box::<HumanApprovalGate>::default());
        registry
    }

    fn insert<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn Gate> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Arc::new(factory));
    }

    /// Register an external gate implementation under `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> Result<(), GateError>
    where
        F: Fn() -> Box<dyn Gate> + Send + Sync + 'static,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(GateError::InvalidPipeline("gate name must not be empty".into()));
        }
        if self.factories.contains_key(&name) {
            return Err(GateError::DuplicateGate(name));
        }
        debug!(gate = %name, "Gate registered");
        self.insert(&name, factory);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Build a fresh gate instance and configure it with `policy`.
    pub fn instantiate(&self, name: &str, policy: &GatePolicy) -> Result<Box<dyn Gate>, GateError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| GateError::UnknownGate(name.to_string()))?;
        let mut gate = factory();
        if policy.policy_id.trim().is_empty() {
            return Err(policy.invalid(name, "policy_id must not be empty"));
        }
        gate.configure(policy)?;
        Ok(gate)
    }
}

impl std::fmt::Debug for GateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateRegistry")
            .field("gates", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
