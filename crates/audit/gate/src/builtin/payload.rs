use async_trait::async_trait;
use serde::Deserialize;

use crate::context::{GateVerdict, OperationContext};
use crate::error::GateError;
use crate::policy::GatePolicy;
use crate::traits::Gate;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PayloadSettings {
    #[serde(default)]
    warn_above: Option<usize>,
    #[serde(default)]
    block_above: Option<usize>,
    /// Block empty input evidence.
    #[serde(default)]
    reject_empty: bool,
}

/// Structural check on input evidence size.
#[derive(Default)]
pub struct PayloadLimitGate {
    settings: PayloadSettings,
}

impl PayloadLimitGate {
    pub const NAME: &'static str = "payload_limit";
}

#[async_trait]
impl Gate for PayloadLimitGate {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn configure(&mut self, policy: &GatePolicy) -> Result<(), GateError> {
        let settings: PayloadSettings = policy.settings_as(Self::NAME)?;
        if settings.warn_above.is_none() && settings.block_above.is_none() && !settings.reject_empty
        {
            return Err(policy.invalid(Self::NAME, "no limit configured"));
        }
        if let (Some(warn), Some(block)) = (settings.warn_above, settings.block_above) {
            if warn > block {
                return Err(policy.invalid(
                    Self::NAME,
                    format!("warn_above ({}) exceeds block_above ({})", warn, block),
                ));
            }
        }
        self.settings = settings;
        Ok(())
    }

    async fn evaluate(&self, ctx: &OperationContext) -> Result<GateVerdict, GateError> {
        let len = ctx.input_len;
        if self.settings.reject_empty && len == 0 {
            return Ok(GateVerdict::block("input evidence is empty"));
        }
        if let Some(limit) = self.settings.block_above {
            if len > limit {
                return Ok(GateVerdict::block(format!(
                    "input is {} bytes, limit is {}",
                    len, limit
                )));
            }
        }
        if let Some(limit) = self.settings.warn_above {
            if len > limit {
                return Ok(GateVerdict::warn(format!(
                    "input is {} bytes, above warning threshold {}",
                    len, limit
                )));
            }
        }
        Ok(GateVerdict::pass())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::testing::ctx;
    use crate::context::GateStatus;
    use maple_audit_types::OperationType;
    use serde_json::json;

    #[tokio::test]
    async fn thresholds() {
        let mut gate = PayloadLimitGate::default();
        let settings = json!({ "warn_above": 10, "block_above": 100 });
        let policy = GatePolicy::blocking("size").with_settings(settings);
        gate.configure(&policy).unwrap();

        for (len, expected) in [
            (10, GateStatus::Pass),
            (11, GateStatus::Warn),
            (101, GateStatus::Block),
        ] {
            let ctx = ctx(OperationType::Inference).with_input_len(len);
            assert_eq!(gate.evaluate(&ctx).await.unwrap().status, expected, "len {}", len);
        }
    }

    #[test]
    fn inverted_thresholds_are_rejected() {
        let mut gate = PayloadLimitGate::default();
        let settings = json!({ "warn_above": 100, "block_above": 10 });
        let policy = GatePolicy::blocking("size").with_settings(settings);
        let err = gate.configure(&policy).unwrap_err();
        assert!(matches!(err, GateError::InvalidPolicy { .. }));
    }
}
