use async_trait::async_trait;
use serde::Deserialize;

use crate::context::{GateStatus, GateVerdict, OperationContext};
use crate::error::GateError;
use crate::policy::GatePolicy;
use crate::traits::Gate;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct StaticSettings {
    #[serde(default)]
    status: GateStatus,
    #[serde(default)]
    reasons: Vec<String>,
}

/// Returns the verdict its policy names, whatever the operation.
///
/// Registered under `static`; also handy under another name as a
/// placeholder for checks performed outside the core.
pub struct StaticGate {
    name: String,
    verdict: GateVerdict,
}

impl StaticGate {
    pub const NAME: &'static str = "static";

    pub fn new() -> Self {
        Self::named(Self::NAME)
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            verdict: GateVerdict::pass(),
        }
    }
}

impl Default for StaticGate {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Gate for StaticGate {
    fn name(&self) -> &str {
        &self.name
    }

    fn configure(&mut self, policy: &GatePolicy) -> Result<(), GateError> {
        let settings: StaticSettings = policy.settings_as(&self.name)?;
        let mut reasons = settings.reasons;
        if settings.status != GateStatus::Pass && reasons.is_empty() {
            reasons.push(format!("policy {} returns {}", policy.policy_id, settings.status));
        }
        self.verdict = GateVerdict {
            status: settings.status,
            reasons,
        };
        Ok(())
    }

    async fn evaluate(&self, _ctx: &OperationContext) -> Result<GateVerdict, GateError> {
        Ok(self.verdict.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::testing::ctx;
    use maple_audit_types::OperationType;
    use serde_json::json;

    #[tokio::test]
    async fn returns_configured_verdict() {
        let mut gate = StaticGate::named("schema_check");
        let policy = GatePolicy::blocking("deny-all").with_settings(json!({ "status": "block" }));
        gate.configure(&policy).unwrap();
        let verdict = gate.evaluate(&ctx(OperationType::Inference)).await.unwrap();
        assert_eq!(verdict.status, GateStatus::Block);
        assert_eq!(verdict.reasons, vec!["policy deny-all returns block".to_string()]);
        assert_eq!(gate.name(), "schema_check");
    }

    #[tokio::test]
    async fn defaults_to_pass() {
        let mut gate = StaticGate::new();
        gate.configure(&GatePolicy::blocking("noop")).unwrap();
        let verdict = gate.evaluate(&ctx(OperationType::Other)).await.unwrap();
        assert_eq!(verdict, GateVerdict::pass());
    }
}
