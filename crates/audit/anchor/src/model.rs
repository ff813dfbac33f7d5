use maple_audit_types::{AnchorId, AnchorKind, Timestamp};
use serde::{Deserialize, Serialize};

/// A durable subject that receipts attach to: one dataset or model version.
///
/// `anchor_id` and `kind` never change once written. Retirement is expressed
/// by a later anchor whose `supersedes` names this one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    pub anchor_id: AnchorId,
    pub kind: AnchorKind,
    pub created_at: Timestamp,
    /// Dataset a model was trained from. Always `None` for datasets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_anchor_id: Option<AnchorId>,
    /// Anchor this one retires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<AnchorId>,
}

impl Anchor {
    pub fn is_dataset(&self) -> bool {
        self.kind == AnchorKind::Dataset
    }

    /// Whether `other` describes the same anchor, ignoring creation time.
    pub(crate) fn same_identity(&self, other: &Anchor) -> bool {
        self.anchor_id == other.anchor_id
            && self.kind == other.kind
            && self.parent_anchor_id == other.parent_anchor_id
            && self.supersedes == other.supersedes
    }
}
