use serde::{Deserialize, Serialize};

/// Strong typed string IDs used throughout the audit trail.
///
/// Generated ids carry a short kind prefix (`anc-`, `rcp-`, `bat-`, `op-`);
/// caller-supplied ids are accepted verbatim.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Fresh unique id.
            pub fn generate() -> Self {
                Self(format!(concat!($prefix, "-{}"), uuid::Uuid::new_v4()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Durable identifier of a dataset or model version.
    AnchorId,
    "anc"
);
string_id!(
    /// Unique identifier of a signed receipt.
    ReceiptId,
    "rcp"
);
string_id!(
    /// Identifier of a closed Merkle batch.
    BatchId,
    "bat"
);
string_id!(
    /// Caller-supplied correlation id for one operation.
    OperationId,
    "op"
);
