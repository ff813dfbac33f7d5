//! Generic gates shipped with the orchestrator.
//!
//! None of them encode domain rules; every threshold, attribute name and
//! accepted status comes from the policy a gate is bound to.

pub mod allowlist;
pub mod approval;
pub mod attributes;
pub mod consent;
pub mod payload;
pub mod static_gate;

pub use allowlist::OperationAllowlistGate;
pub use approval::HumanApprovalGate;
pub use attributes::RequiredAttributesGate;
pub use consent::ConsentGate;
pub use payload::PayloadLimitGate;
pub use static_gate::StaticGate;

#[cfg(test)]
pub(crate) mod testing {
    use maple_audit_types::{AnchorId, AnchorKind, OperationId, OperationType};

    use crate::context::OperationContext;

    pub fn ctx(operation_type: OperationType) -> OperationContext {
        OperationContext::new(
            OperationId::new("op-test"),
            operation_type,
            AnchorId::new("anc-test"),
            AnchorKind::Dataset,
        )
    }
}
