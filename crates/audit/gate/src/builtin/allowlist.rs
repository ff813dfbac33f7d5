use async_trait::async_trait;
use maple_audit_types::OperationType;
use serde::Deserialize;

use crate::context::{GateVerdict, OperationContext};
use crate::error::GateError;
use crate::policy::GatePolicy;
use crate::traits::Gate;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct AllowlistSettings {
    allowed: Vec<OperationType>,
}

/// Blocks operation types the policy does not list.
#[derive(Default)]
pub struct OperationAllowlistGate {
    settings: AllowlistSettings,
}

impl OperationAllowlistGate {
    pub const NAME: &'static str = "operation_allowlist";
}

#[async_trait]
impl Gate for OperationAllowlistGate {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn configure(&mut self, policy: &GatePolicy) -> Result<(), GateError> {
        let settings: AllowlistSettings = policy.settings_as(Self::NAME)?;
        if settings.allowed.is_empty() {
            return Err(policy.invalid(Self::NAME, "allowed must list at least one operation type"));
        }
        self.settings = settings;
        Ok(())
    }

    async fn evaluate(&self, ctx: &OperationContext) -> Result<GateVerdict, GateError> {
        if self.settings.allowed.contains(&ctx.operation_type) {
            Ok(GateVerdict::pass())
        } else {
            Ok(GateVerdict::block(format!(
                "operation type {} is not allowed",
                ctx.operation_type
            )))
        }
    }
}
