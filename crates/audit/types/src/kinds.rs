use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} variant: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! closed_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

closed_enum!(
    /// What an anchor identifies.
    AnchorKind, "anchor kind" {
        Dataset => "dataset",
        Model => "model",
    }
);

closed_enum!(
    /// Operation recorded by a receipt.
    OperationType, "operation type" {
        DatasetCreate => "dataset_create",
        ModelTrain => "model_train",
        Inference => "inference",
        Other => "other",
    }
);

closed_enum!(
    /// How much raw evidence is retained next to a receipt's commitments.
    ///
    /// Never changes the commitments themselves.
    EvidenceStrength, "evidence strength" {
        /// Capsule stored inline; materialization reads it back.
        Full => "full",
        /// Hashes plus size metadata only; caller supplies the payload to audit.
        Summary => "summary",
        /// A pointer to externally held evidence; caller supplies the payload to audit.
        Reference => "reference",
    }
);

closed_enum!(
    /// Consent state of the data subject(s) behind an operation.
    ///
    /// The single representation used across the audit trail; gates and
    /// collaborators translate into this, never around it.
    ConsentStatus, "consent status" {
        Granted => "granted",
        Denied => "denied",
        Withdrawn => "withdrawn",
        Expired => "expired",
        NotRequired => "not_required",
        Unknown => "unknown",
    }
);

impl ConsentStatus {
    /// Whether the status permits processing.
    pub fn permits_processing(&self) -> bool {
        matches!(self, ConsentStatus::Granted | ConsentStatus::NotRequired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&OperationType::DatasetCreate).unwrap(),
            "\"dataset_create\""
        );
        assert_eq!(
            "model_train".parse::<OperationType>().unwrap(),
            OperationType::ModelTrain
        );
    }

    #[test]
    fn unknown_variant_is_reported() {
        let err = "bulk".parse::<EvidenceStrength>().unwrap_err();
        assert_eq!(err.kind, "evidence strength");
        assert_eq!(err.value, "bulk");
    }

    #[test]
    fn display_matches_serde() {
        for kind in AnchorKind::ALL {
            let json = serde_json::to_string(kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind));
        }
    }

    #[test]
    fn consent_processing_rules() {
        assert!(ConsentStatus::Granted.permits_processing());
        assert!(ConsentStatus::NotRequired.permits_processing());
        assert!(!ConsentStatus::Withdrawn.permits_processing());
        assert!(!ConsentStatus::Unknown.permits_processing());
    }
}
