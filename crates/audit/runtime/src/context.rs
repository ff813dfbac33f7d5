use std::sync::Arc;

use maple_audit_anchor::AnchorManager;
use maple_audit_batch::{BatchEngine, SignedRoot};
use maple_audit_gate::{GateOrchestrator, GateRegistry};
use maple_audit_ledger::WormLedger;
use maple_audit_receipt::ReceiptService;
use maple_crypto::{CommitmentEngine, PublicKey, ReceiptSigner, VerifyingKey};
use tokio::time::Duration;
use tracing::info;

use crate::config::{AuditConfig, LedgerConfig};
use crate::error::AuditResult;
use crate::pending::{BatchRoller, PendingReceipts};

/// Everything one audit deployment needs, built once at startup and passed
/// to every operation.
///
/// The receipt and batch services built here share one ledger, one signing
/// key and one gate pipeline.
pub struct AuditContext {
    config: AuditConfig,
    ledger: WormLedger,
    signer: Arc<ReceiptSigner>,
    anchors: AnchorManager,
    receipts: ReceiptService,
    batches: BatchEngine,
    pending: PendingReceipts,
    roller: Option<BatchRoller>,
}

impl AuditContext {
    /// Validate `config`, open the ledger, load the signing key, build the
    /// gate pipeline from `registry` and start the batch roller.
    ///
    /// Every configuration error surfaces here, never during an operation.
    pub async fn bootstrap(config: AuditConfig, registry: GateRegistry) -> AuditResult<Self> {
        config.validate()?;

        let engine = CommitmentEngine::from_algorithm_id(&config.commitment.algorithm)?;
        let pipeline = config.build_pipeline(&registry)?;
        let ledger = match &config.ledger {
            LedgerConfig::Memory => WormLedger::in_memory(),
            LedgerConfig::File { dir } => WormLedger::file_backed(dir.clone())?,
        };
        let signer = Arc::new(config.signer.load()?);

        let anchors = AnchorManager::new(ledger.clone());
        let receipts = ReceiptService::new(
            ledger.clone(),
            anchors.clone(),
            GateOrchestrator::new(pipeline),
            engine,
            signer.clone(),
        );
        let batches = BatchEngine::new(ledger.clone(), receipts.clone(), signer.clone());
        let pending = PendingReceipts::new(batches.clone(), config.batch.max_leaves);

        let roller = match config.batch.roll_interval_secs {
            0 => None,
            secs => Some(BatchRoller::spawn(pending.clone(), Duration::from_secs(secs))),
        };

        info!(
            key_id = %signer.key_id(),
            algorithm = %config.commitment.algorithm,
            stages = config.pipeline.len(),
            max_leaves = config.batch.max_leaves,
            "Audit context ready"
        );

        Ok(Self {
            config,
            ledger,
            signer,
            anchors,
            receipts,
            batches,
            pending,
            roller,
        })
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    pub fn ledger(&self) -> &WormLedger {
        &self.ledger
    }

    pub fn anchors(&self) -> &AnchorManager {
        &self.anchors
    }

    pub fn receipts(&self) -> &ReceiptService {
        &self.receipts
    }

    pub fn batches(&self) -> &BatchEngine {
        &self.batches
    }

    pub fn pending(&self) -> &PendingReceipts {
        &self.pending
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signer.verifying_key()
    }

    /// Public half of the signing key, for handing to external auditors.
    pub fn public_key(&self) -> PublicKey {
        self.signer.public_key()
    }

    /// Stop the roller, close any pending receipts into a final batch and
    /// release the context, including its handle on the signing key.
    pub async fn shutdown(mut self) -> AuditResult<Option<SignedRoot>> {
        if let Some(roller) = self.roller.take() {
            roller.stop().await;
        }

        let last = self.pending.flush().await?;
        if let Some(root) = &last {
            info!(batch_id = %root.batch_id, leaf_count = root.leaf_count, "Closed final batch");
        }
        info!("Audit context shut down");
        Ok(last)
    }
}

impl std::fmt::Debug for AuditContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditContext")
            .field("signer", &self.signer)
            .field("ledger", &self.config.ledger)
            .finish_non_exhaustive()
    }
}
