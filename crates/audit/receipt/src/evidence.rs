use maple_audit_gate::GateFinding;
use maple_audit_types::{EvidenceStrength, ReceiptId};
use serde::{Deserialize, Serialize};

use crate::receipt::Receipt;

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        hex::decode(encoded).map_err(serde::de::Error::custom)
    }
}

/// How much raw evidence to keep alongside the commitments.
///
/// Only affects what is additionally stored; the commitments are identical
/// for every choice.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strength", rename_all = "snake_case")]
pub enum Retention {
    /// Keep the full input and output inline.
    Full,
    /// Keep sizes and an optional note; payloads must be supplied to audit.
    Summary {
        #[serde(default)]
        note: Option<String>,
    },
    /// Keep a pointer to where the caller stores the payloads.
    Reference { locator: String },
}

impl Retention {
    pub fn strength(&self) -> EvidenceStrength {
        match self {
            Retention::Full => EvidenceStrength::Full,
            Retention::Summary { .. } => EvidenceStrength::Summary,
            Retention::Reference { .. } => EvidenceStrength::Reference,
        }
    }
}

impl Default for Retention {
    fn default() -> Self {
        Retention::Summary { note: None }
    }
}

/// Evidence stored next to a receipt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strength", rename_all = "snake_case")]
pub enum RetainedEvidence {
    Full {
        #[serde(with = "hex_bytes")]
        input: Vec<u8>,
        #[serde(with = "hex_bytes")]
        output: Vec<u8>,
    },
    Summary {
        input_len: usize,
        output_len: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    },
    Reference {
        locator: String,
    },
}

impl RetainedEvidence {
    pub(crate) fn retain(retention: &Retention, input: &[u8], output: &[u8]) -> Self {
        match retention {
            Retention::Full => RetainedEvidence::Full {
                input: input.to_vec(),
                output: output.to_vec(),
            },
            Retention::Summary { note } => RetainedEvidence::Summary {
                input_len: input.len(),
                output_len: output.len(),
                note: note.clone(),
            },
            Retention::Reference { locator } => RetainedEvidence::Reference {
                locator: locator.clone(),
            },
        }
    }

    pub fn strength(&self) -> EvidenceStrength {
        match self {
            RetainedEvidence::Full { .. } => EvidenceStrength::Full,
            RetainedEvidence::Summary { .. } => EvidenceStrength::Summary,
            RetainedEvidence::Reference { .. } => EvidenceStrength::Reference,
        }
    }
}

/// What one ledger `put` stores for a receipt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptRecord {
    pub receipt: Receipt,
    pub evidence: RetainedEvidence,
    /// WARN findings from the gate pipeline, kept for audit.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gate_warnings: Vec<GateFinding>,
}

/// Original payloads handed in by an auditor.
#[derive(Clone, PartialEq, Eq)]
pub struct SuppliedEvidence {
    pub input: Vec<u8>,
    pub output: Vec<u8>,
}

impl SuppliedEvidence {
    pub fn new(input: impl Into<Vec<u8>>, output: impl Into<Vec<u8>>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }
}

impl std::fmt::Debug for SuppliedEvidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuppliedEvidence")
            .field("input_len", &self.input.len())
            .field("output_len", &self.output.len())
            .finish()
    }
}

/// Full evidence for a receipt, verified against its commitments.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceCapsule {
    pub receipt_id: ReceiptId,
    pub evidence_strength: EvidenceStrength,
    #[serde(with = "hex_bytes")]
    pub input: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub output: Vec<u8>,
}

impl std::fmt::Debug for EvidenceCapsule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvidenceCapsule")
            .field("receipt_id", &self.receipt_id)
            .field("evidence_strength", &self.evidence_strength)
            .field("input_len", &self.input.len())
            .field("output_len", &self.output.len())
            .finish()
    }
}
