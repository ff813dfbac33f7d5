use async_trait::async_trait;
use serde::Deserialize;

use crate::context::{GateVerdict, OperationContext};
use crate::error::GateError;
use crate::policy::GatePolicy;
use crate::traits::Gate;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct AttributeSettings {
    attributes: Vec<String>,
    /// Also block when a required attribute is present but blank.
    #[serde(default)]
    reject_blank: bool,
}

/// Structural check: the context must carry every named attribute.
#[derive(Default)]
pub struct RequiredAttributesGate {
    settings: AttributeSettings,
}

impl RequiredAttributesGate {
    pub const NAME: &'static str = "required_attributes";
}

#[async_trait]
impl Gate for RequiredAttributesGate {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn configure(&mut self, policy: &GatePolicy) -> Result<(), GateError> {
        let settings: AttributeSettings = policy.settings_as(Self::NAME)?;
        if settings.attributes.is_empty() {
            return Err(policy.invalid(Self::NAME, "attributes must name at least one key"));
        }
        if settings.attributes.iter().any(|a| a.trim().is_empty()) {
            return Err(policy.invalid(Self::NAME, "attribute names must not be blank"));
        }
        self.settings = settings;
        Ok(())
    }

    async fn evaluate(&self, ctx: &OperationContext) -> Result<GateVerdict, GateError> {
        let missing: Vec<&str> = self
            .settings
            .attributes
            .iter()
            .filter(|name| match ctx.attributes.get(name.as_str()) {
                None => true,
                Some(v) => self.settings.reject_blank && v.trim().is_empty(),
            })
            .map(String::as_str)
            .collect();

        if missing.is_empty() {
            Ok(GateVerdict::pass())
        } else {
            Ok(GateVerdict::block(format!(
                "missing required attributes: {}",
                missing.join(", ")
            )))
        }
    }
}
