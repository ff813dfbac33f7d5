use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::Deserialize;

use crate::context::{GateVerdict, OperationContext};
use crate::error::GateError;
use crate::policy::GatePolicy;
use crate::traits::Gate;

fn one() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ApprovalSettings {
    #[serde(default = "one")]
    min_approvals: u32,
    /// Only approvals carrying this role count.
    #[serde(default)]
    role: Option<String>,
}

impl Default for ApprovalSettings {
    fn default() -> Self {
        Self {
            min_approvals: 1,
            role: None,
        }
    }
}

/// External approval stage: requires a number of distinct human approvers.
#[derive(Default)]
pub struct HumanApprovalGate {
    settings: ApprovalSettings,
}

impl HumanApprovalGate {
    pub const NAME: &'static str = "human_approval";
}

#[async_trait]
impl Gate for HumanApprovalGate {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn configure(&mut self, policy: &GatePolicy) -> Result<(), GateError> {
        let settings: ApprovalSettings = policy.settings_as(Self::NAME)?;
        if settings.min_approvals == 0 {
            return Err(policy.invalid(Self::NAME, "min_approvals must be at least 1"));
        }
        self.settings = settings;
        Ok(())
    }

    async fn evaluate(&self, ctx: &OperationContext) -> Result<GateVerdict, GateError> {
        let approvers: BTreeSet<&str> = ctx
            .approvals
            .iter()
            .filter(|a| match &self.settings.role {
                Some(role) => a.role.as_deref() == Some(role.as_str()),
                None => true,
            })
            .map(|a| a.approver.as_str())
            .collect();

        let found = approvers.len() as u32;
        let needed = self.settings.min_approvals;
        if found >= needed {
            return Ok(GateVerdict::pass());
        }
        let role = match &self.settings.role {
            Some(r) => format!(" with role {}", r),
            None => String::new(),
        };
        Ok(GateVerdict::block(format!(
            "requires {} human approval(s){}, found {}",
            needed, role, found
        )))
    }
}
