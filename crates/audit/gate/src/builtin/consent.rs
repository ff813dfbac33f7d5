use async_trait::async_trait;
use maple_audit_types::{ConsentStatus, OperationType};
use serde::Deserialize;

use crate::context::{GateVerdict, OperationContext};
use crate::error::GateError;
use crate::policy::GatePolicy;
use crate::traits::Gate;

fn default_accept() -> Vec<ConsentStatus> {
    vec![ConsentStatus::Granted, ConsentStatus::NotRequired]
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConsentSettings {
    /// Operation types that need consent; empty means all.
    #[serde(default)]
    required_for: Vec<OperationType>,
    #[serde(default = "default_accept")]
    accept: Vec<ConsentStatus>,
}

impl Default for ConsentSettings {
    fn default() -> Self {
        Self {
            required_for: Vec::new(),
            accept: default_accept(),
        }
    }
}

/// Checks the operation's consent status against the accepted set.
///
/// A missing status is treated as `unknown`, so it only passes if the policy
/// explicitly accepts `unknown`.
#[derive(Default)]
pub struct ConsentGate {
    settings: ConsentSettings,
}

impl ConsentGate {
    pub const NAME: &'static str = "consent";
}

#[async_trait]
impl Gate for ConsentGate {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn configure(&mut self, policy: &GatePolicy) -> Result<(), GateError> {
        let settings: ConsentSettings = policy.settings_as(Self::NAME)?;
        if settings.accept.is_empty() {
            return Err(policy.invalid(Self::NAME, "accept must list at least one consent status"));
        }
        if let Some(bad) = settings.accept.iter().find(|s| {
            matches!(
                s,
                ConsentStatus::Denied | ConsentStatus::Withdrawn | ConsentStatus::Expired
            )
        }) {
            return Err(policy.invalid(Self::NAME, format!("{} cannot be accepted", bad)));
        }
        self.settings = settings;
        Ok(())
    }

    async fn evaluate(&self, ctx: &OperationContext) -> Result<GateVerdict, GateError> {
        let required = &self.settings.required_for;
        if !required.is_empty() && !required.contains(&ctx.operation_type) {
            return Ok(GateVerdict::pass());
        }
        let status = ctx.consent.unwrap_or(ConsentStatus::Unknown);
        if self.settings.accept.contains(&status) {
            Ok(GateVerdict::pass())
        } else {
            Ok(GateVerdict::block(format!("consent status is {}", status)))
        }
    }
}
