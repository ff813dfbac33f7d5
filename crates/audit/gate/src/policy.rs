use maple_audit_types::{AnchorKind, OperationType};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::context::OperationContext;
use crate::error::GateError;

/// How a gate's BLOCK is treated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Enforcement {
    /// BLOCK prevents the operation from being finalized.
    #[default]
    Blocking,
    /// BLOCK is recorded as a warning only.
    Advisory,
}

/// Configuration value object a gate is bound to.
///
/// `settings` is gate-specific; each gate deserialises it into its own typed
/// struct in `configure`, so a malformed policy fails when the pipeline is
/// built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GatePolicy {
    pub policy_id: String,
    #[serde(default)]
    pub enforcement: Enforcement,
    #[serde(default)]
    pub settings: serde_json::Value,
}

impl GatePolicy {
    pub fn new(policy_id: impl Into<String>, enforcement: Enforcement) -> Self {
        Self {
            policy_id: policy_id.into(),
            enforcement,
            settings: serde_json::Value::Null,
        }
    }

    pub fn blocking(policy_id: impl Into<String>) -> Self {
        Self::new(policy_id, Enforcement::Blocking)
    }

    pub fn advisory(policy_id: impl Into<String>) -> Self {
        Self::new(policy_id, Enforcement::Advisory)
    }

    pub fn with_settings(mut self, settings: serde_json::Value) -> Self {
        self.settings = settings;
        self
    }

    /// Decode `settings` for `gate`. Absent settings decode as `{}`.
    pub fn settings_as<T: DeserializeOwned>(&self, gate: &str) -> Result<T, GateError> {
        let value = match &self.settings {
            serde_json::Value::Null => serde_json::Value::Object(Default::default()),
            other => other.clone(),
        };
        serde_json::from_value(value).map_err(|e| self.invalid(gate, e.to_string()))
    }

    pub fn invalid(&self, gate: &str, reason: impl Into<String>) -> GateError {
        GateError::InvalidPolicy {
            gate: gate.to_string(),
            policy_id: self.policy_id.clone(),
            reason: reason.into(),
        }
    }
}

/// Which operations a binding applies to. Empty lists match everything.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateScope {
    #[serde(default)]
    pub operation_types: Vec<OperationType>,
    #[serde(default)]
    pub anchor_kinds: Vec<AnchorKind>,
}

impl GateScope {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn operations(types: impl IntoIterator<Item = OperationType>) -> Self {
        Self {
            operation_types: types.into_iter().collect(),
            anchor_kinds: Vec::new(),
        }
    }

    pub fn applies_to(&self, ctx: &OperationContext) -> bool {
        (self.operation_types.is_empty() || self.operation_types.contains(&ctx.operation_type))
            && (self.anchor_kinds.is_empty() || self.anchor_kinds.contains(&ctx.anchor_kind))
    }
}

/// A registered gate name bound to a policy and scope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GateBinding {
    pub gate: String,
    pub policy: GatePolicy,
    #[serde(default)]
    pub scope: GateScope,
}

impl GateBinding {
    pub fn new(gate: impl Into<String>, policy: GatePolicy) -> Self {
        Self {
            gate: gate.into(),
            policy,
            scope: GateScope::all(),
        }
    }

    pub fn scoped(mut self, scope: GateScope) -> Self {
        self.scope = scope;
        self
    }
}

/// Serializable description of one pipeline stage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StageSpec {
    pub name: String,
    pub gates: Vec<GateBinding>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use maple_audit_types::{AnchorId, OperationId};
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Limits {
        #[serde(default)]
        max: u32,
    }

    #[test]
    fn null_settings_decode_as_defaults() {
        let policy = GatePolicy::blocking("p1");
        let limits: Limits = policy.settings_as("limit").unwrap();
        assert_eq!(limits.max, 0);
    }

    #[test]
    fn unknown_settings_fields_are_rejected() {
        let policy = GatePolicy::blocking("p1").with_settings(json!({ "maximum": 3 }));
        let err = policy.settings_as::<Limits>("limit").unwrap_err();
        assert!(matches!(err, GateError::InvalidPolicy { ref policy_id, .. } if policy_id == "p1"));
    }

    #[test]
    fn scope_matching() {
        let ctx = OperationContext::new(
            OperationId::new("op-1"),
            OperationType::Inference,
            AnchorId::new("m1"),
            AnchorKind::Model,
        );
        assert!(GateScope::all().applies_to(&ctx));
        assert!(GateScope::operations([OperationType::Inference]).applies_to(&ctx));
        assert!(!GateScope::operations([OperationType::ModelTrain]).applies_to(&ctx));

        let datasets_only = GateScope {
            operation_types: vec![],
            anchor_kinds: vec![AnchorKind::Dataset],
        };
        assert!(!datasets_only.applies_to(&ctx));
    }

    #[test]
    fn binding_deserializes_with_defaults() {
        let binding: GateBinding = serde_json::from_value(json!({
            "gate": "consent",
            "policy": { "policy_id": "gdpr-consent" }
        }))
        .unwrap();
        assert_eq!(binding.policy.enforcement, Enforcement::Blocking);
        assert_eq!(binding.scope, GateScope::all());
    }
}
