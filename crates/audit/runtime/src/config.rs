//! Configuration for the audit runtime

use std::collections::HashSet;
use std::path::PathBuf;

use maple_audit_gate::{GatePipeline, GateRegistry, StageSpec};
use maple_crypto::{HashAlgorithm, ReceiptSigner};
use serde::{Deserialize, Serialize};

use crate::error::{AuditError, AuditResult};

/// Main runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Ledger backend
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Receipt and batch-root signing identity
    #[serde(default)]
    pub signer: SignerConfig,

    #[serde(default)]
    pub commitment: CommitmentConfig,

    #[serde(default)]
    pub batch: BatchConfig,

    /// Ordered gate stages run before every receipt
    #[serde(default)]
    pub pipeline: Vec<StageSpec>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            ledger: LedgerConfig::default(),
            signer: SignerConfig::default(),
            commitment: CommitmentConfig::default(),
            batch: BatchConfig::default(),
            pipeline: Vec::new(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Ledger backend configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LedgerConfig {
    /// In-memory ledger (for development/testing)
    #[default]
    Memory,

    /// Durable file-backed ledger
    File {
        /// Root directory of the ledger
        dir: PathBuf,
    },
}

/// Signing identity configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SignerConfig {
    /// Fresh key generated at startup; receipts only verify within this process
    #[default]
    Ephemeral,

    /// Hex-encoded Ed25519 secret read once at startup
    File { path: PathBuf },
}

impl SignerConfig {
    pub fn load(&self) -> AuditResult<ReceiptSigner> {
        match self {
            SignerConfig::Ephemeral => Ok(ReceiptSigner::generate()),
            SignerConfig::File { path } => Ok(ReceiptSigner::load(path)?),
        }
    }
}

/// Commitment engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentConfig {
    /// Hash algorithm id, e.g. `blake3-256/v1`
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
}

impl Default for CommitmentConfig {
    fn default() -> Self {
        Self {
            algorithm: default_algorithm(),
        }
    }
}

/// Batch rolling configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Pending receipts that trigger an automatic batch close
    #[serde(default = "default_max_leaves")]
    pub max_leaves: usize,

    /// Interval of the background flush; 0 disables it
    #[serde(default = "default_roll_interval")]
    pub roll_interval_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_leaves: default_max_leaves(),
            roll_interval_secs: default_roll_interval(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_algorithm() -> String {
    HashAlgorithm::BLAKE3_V1_ID.to_string()
}

fn default_max_leaves() -> usize {
    1024
}

fn default_roll_interval() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AuditConfig {
    /// Load configuration: defaults, then the optional file, then
    /// `MAPLE_AUDIT_*` environment variables (`__` separates nested keys,
    /// e.g. `MAPLE_AUDIT_BATCH__MAX_LEAVES`).
    pub fn load(path: Option<&str>) -> AuditResult<Self> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&AuditConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("MAPLE_AUDIT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AuditConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject malformed values that do not need a gate registry to detect.
    pub fn validate(&self) -> AuditResult<()> {
        HashAlgorithm::parse(&self.commitment.algorithm)?;

        if self.batch.max_leaves == 0 {
            return Err(AuditError::Config("batch.max_leaves must be at least 1".into()));
        }
        if let LedgerConfig::File { dir } = &self.ledger {
            if dir.as_os_str().is_empty() {
                return Err(AuditError::Config("ledger.dir must not be empty".into()));
            }
        }
        if let SignerConfig::File { path } = &self.signer {
            if path.as_os_str().is_empty() {
                return Err(AuditError::Config("signer.path must not be empty".into()));
            }
        }
        // Stored receipts would stop verifying after a restart.
        if matches!(
            (&self.ledger, &self.signer),
            (LedgerConfig::File { .. }, SignerConfig::Ephemeral)
        ) {
            return Err(AuditError::Config(
                "a file ledger needs a file signer; an ephemeral key is lost on restart".into(),
            ));
        }

        let mut names = HashSet::new();
        for stage in &self.pipeline {
            if stage.name.trim().is_empty() {
                return Err(AuditError::Config("pipeline stage names must not be empty".into()));
            }
            if !names.insert(stage.name.as_str()) {
                return Err(AuditError::Config(format!(
                    "duplicate pipeline stage {:?}",
                    stage.name
                )));
            }
        }
        Ok(())
    }

    /// Build the configured pipeline against `registry`, configuring every
    /// gate. Unknown gates and malformed policies fail here.
    pub fn build_pipeline(&self, registry: &GateRegistry) -> AuditResult<GatePipeline> {
        Ok(GatePipeline::from_specs(registry, &self.pipeline)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maple_audit_gate::{GateBinding, GatePolicy};
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AuditConfig::default();
        assert_eq!(config.ledger, LedgerConfig::Memory);
        assert_eq!(config.signer, SignerConfig::Ephemeral);
        assert_eq!(config.commitment.algorithm, "blake3-256/v1");
        assert_eq!(config.batch.max_leaves, 1024);
        assert!(config.pipeline.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_unknown_algorithm_and_zero_leaves() {
        let mut config = AuditConfig::default();
        config.commitment.algorithm = "sha1".into();
        assert!(config.validate().is_err());

        let mut config = AuditConfig::default();
        config.batch.max_leaves = 0;
        assert!(matches!(config.validate(), Err(AuditError::Config(_))));
    }

    #[test]
    fn file_ledger_rejects_ephemeral_signer() {
        let mut config = AuditConfig::default();
        config.ledger = LedgerConfig::File {
            dir: PathBuf::from("/var/lib/maple-audit"),
        };
        assert!(matches!(config.validate(), Err(AuditError::Config(_))));

        config.signer = SignerConfig::File {
            path: PathBuf::from("/etc/maple-audit/signer.key"),
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_duplicate_stage_names() {
        let mut config = AuditConfig::default();
        let stage = StageSpec {
            name: "structural".into(),
            gates: vec![GateBinding::new("static", GatePolicy::blocking("p"))],
        };
        config.pipeline = vec![stage.clone(), stage];
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_gate_fails_when_building_the_pipeline() {
        let mut config = AuditConfig::default();
        config.pipeline = vec![StageSpec {
            name: "policy".into(),
            gates: vec![GateBinding::new("no_such_gate", GatePolicy::blocking("p"))],
        }];
        assert!(config.validate().is_ok());
        let err = config
            .build_pipeline(&GateRegistry::with_builtins())
            .unwrap_err();
        assert!(matches!(err, AuditError::Gate(_)));
    }

    #[test]
    fn loads_file_over_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
[ledger]
type = "file"
dir = "/var/lib/maple-audit"

[signer]
type = "file"
path = "/etc/maple-audit/signer.key"

[batch]
max_leaves = 8

[[pipeline]]
name = "structural"

[[pipeline.gates]]
gate = "payload_limit"

[pipeline.gates.policy]
policy_id = "size-limits"

[pipeline.gates.policy.settings]
block_above = 4096
"#
        )
        .unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let config = AuditConfig::load(Some(&path)).unwrap();
        assert_eq!(
            config.ledger,
            LedgerConfig::File {
                dir: PathBuf::from("/var/lib/maple-audit")
            }
        );
        assert_eq!(
            config.signer,
            SignerConfig::File {
                path: PathBuf::from("/etc/maple-audit/signer.key")
            }
        );
        assert_eq!(config.batch.max_leaves, 8);
        assert_eq!(config.batch.roll_interval_secs, 60);
        assert_eq!(config.pipeline.len(), 1);
        assert_eq!(config.pipeline[0].gates[0].policy.policy_id, "size-limits");

        let pipeline = config
            .build_pipeline(&GateRegistry::with_builtins())
            .unwrap();
        assert_eq!(pipeline.stages().len(), 1);
    }
}
