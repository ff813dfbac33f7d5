use std::collections::BTreeMap;
use std::fmt;

use maple_audit_types::{
    now, AnchorId, AnchorKind, ConsentStatus, OperationId, OperationType, Timestamp,
};
use serde::{Deserialize, Serialize};

/// Verdict status a gate reports.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    #[default]
    Pass,
    Warn,
    Block,
}

impl GateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateStatus::Pass => "pass",
            GateStatus::Warn => "warn",
            GateStatus::Block => "block",
        }
    }
}

impl fmt::Display for GateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one gate evaluation: a status plus free-text reasons.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateVerdict {
    pub status: GateStatus,
    #[serde(default)]
    pub reasons: Vec<String>,
}

impl GateVerdict {
    pub fn pass() -> Self {
        Self {
            status: GateStatus::Pass,
            reasons: Vec::new(),
        }
    }

    pub fn warn(reason: impl Into<String>) -> Self {
        Self {
            status: GateStatus::Warn,
            reasons: vec![reason.into()],
        }
    }

    pub fn block(reason: impl Into<String>) -> Self {
        Self {
            status: GateStatus::Block,
            reasons: vec![reason.into()],
        }
    }
}

/// A recorded human approval attached to an operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    pub approver: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub granted_at: Timestamp,
}

impl Approval {
    pub fn new(approver: impl Into<String>) -> Self {
        Self {
            approver: approver.into(),
            role: None,
            granted_at: now(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }
}

/// Everything a gate may look at. Holds sizes and metadata, never payload
/// bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationContext {
    pub operation_id: OperationId,
    pub operation_type: OperationType,
    pub anchor_id: AnchorId,
    pub anchor_kind: AnchorKind,
    /// Size in bytes of the input evidence.
    pub input_len: usize,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub consent: Option<ConsentStatus>,
    #[serde(default)]
    pub approvals: Vec<Approval>,
}

impl OperationContext {
    pub fn new(
        operation_id: OperationId,
        operation_type: OperationType,
        anchor_id: AnchorId,
        anchor_kind: AnchorKind,
    ) -> Self {
        Self {
            operation_id,
            operation_type,
            anchor_id,
            anchor_kind,
            input_len: 0,
            attributes: BTreeMap::new(),
            consent: None,
            approvals: Vec::new(),
        }
    }

    pub fn with_input_len(mut self, len: usize) -> Self {
        self.input_len = len;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_consent(mut self, consent: ConsentStatus) -> Self {
        self.consent = Some(consent);
        self
    }

    pub fn with_approval(mut self, approval: Approval) -> Self {
        self.approvals.push(approval);
        self
    }
}
