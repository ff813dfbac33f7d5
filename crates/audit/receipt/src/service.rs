use std::collections::BTreeMap;
use std::sync::Arc;

use maple_audit_anchor::AnchorManager;
use maple_audit_gate::{Approval, GateOrchestrator, GateReport, OperationContext};
use maple_audit_ledger::{LedgerKey, WormLedger};
use maple_audit_types::{now, AnchorId, ConsentStatus, OperationId, OperationType, ReceiptId};
use maple_crypto::{CommitmentEngine, ReceiptSigner, SignatureBytes, VerifyingKey};
use tracing::{debug, info, warn};

use crate::cache::MaterializationCache;
use crate::error::ReceiptError;
use crate::evidence::{
    EvidenceCapsule, ReceiptRecord, RetainedEvidence, Retention, SuppliedEvidence,
};
use crate::receipt::Receipt;

/// Ledger namespace holding receipt records.
pub const RECEIPT_NAMESPACE: &str = "receipt";

/// An operation submitted for gating and, later, a receipt.
#[derive(Clone)]
pub struct OperationRequest {
    pub operation_id: OperationId,
    pub operation_type: OperationType,
    pub anchor_id: AnchorId,
    pub input: Vec<u8>,
    pub retention: Retention,
    pub attributes: BTreeMap<String, String>,
    pub consent: Option<ConsentStatus>,
    pub approvals: Vec<Approval>,
}

impl OperationRequest {
    pub fn new(
        anchor_id: AnchorId,
        operation_type: OperationType,
        input: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            operation_id: OperationId::generate(),
            operation_type,
            anchor_id,
            input: input.into(),
            retention: Retention::default(),
            attributes: BTreeMap::new(),
            consent: None,
            approvals: Vec::new(),
        }
    }

    pub fn with_operation_id(mut self, operation_id: OperationId) -> Self {
        self.operation_id = operation_id;
        self
    }

    pub fn with_retention(mut self, retention: Retention) -> Self {
        self.retention = retention;
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

impl std::fmt::Debug for OperationRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationRequest")
            .field("operation_id", &self.operation_id)
            .field("operation_type", &self.operation_type)
            .field("anchor_id", &self.anchor_id)
            .field("input_len", &self.input.len())
            .field("retention", &self.retention)
            .finish_non_exhaustive()
    }
}

/// Creates receipts for gated operations and materializes their evidence.
///
/// Cheap to clone; clones share the ledger, signer and cache.
#[derive(Clone)]
pub struct ReceiptService {
    ledger: WormLedger,
    anchors: AnchorManager,
    orchestrator: GateOrchestrator,
    engine: CommitmentEngine,
    signer: Arc<ReceiptSigner>,
    cache: MaterializationCache,
}

impl ReceiptService {
    pub fn new(
        ledger: WormLedger,
        anchors: AnchorManager,
        orchestrator: GateOrchestrator,
        engine: CommitmentEngine,
        signer: Arc<ReceiptSigner>,
    ) -> Self {
        Self {
            ledger,
            anchors,
            orchestrator,
            engine,
            signer,
            cache: MaterializationCache::default(),
        }
    }

    pub fn with_cache(mut self, cache: MaterializationCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signer.verifying_key()
    }

    pub fn cache(&self) -> &MaterializationCache {
        &self.cache
    }

    fn key(receipt_id: &ReceiptId) -> LedgerKey {
        LedgerKey::new(RECEIPT_NAMESPACE, receipt_id.as_str())
    }

    /// Gate an operation.
    ///
    /// On BLOCK nothing is written and `GateBlocked` names the blocking gates
    /// with their reasons. Otherwise the returned handle finalizes the
    /// receipt; dropping it abandons the operation without side effects.
    pub async fn begin_operation(
        &self,
        request: OperationRequest,
    ) -> Result<OperationHandle, ReceiptError> {
        if request.operation_id.is_empty() {
            return Err(ReceiptError::InvalidRequest("operation_id must not be empty".into()));
        }
        if let Retention::Reference { locator } = &request.retention {
            if locator.trim().is_empty() {
                return Err(ReceiptError::InvalidRequest(
                    "reference retention needs a locator".into(),
                ));
            }
        }

        let anchor = self.anchors.get_anchor(&request.anchor_id).await?;

        let ctx = OperationContext {
            operation_id: request.operation_id.clone(),
            operation_type: request.operation_type,
            anchor_id: anchor.anchor_id.clone(),
            anchor_kind: anchor.kind,
            input_len: request.input.len(),
            attributes: request.attributes,
            consent: request.consent,
            approvals: request.approvals,
        };

        let report = self.orchestrator.evaluate(&ctx).await;
        if report.is_blocked() {
            let stage = report.blocked_stage().unwrap_or_default().to_string();
            let findings: Vec<_> = report.blocking_findings().into_iter().cloned().collect();
            warn!(
                operation_id = %ctx.operation_id,
                anchor_id = %ctx.anchor_id,
                stage = %stage,
                "Operation blocked; no receipt written"
            );
            return Err(ReceiptError::GateBlocked {
                operation_id: ctx.operation_id,
                stage,
                findings,
            });
        }

        debug!(
            operation_id = %ctx.operation_id,
            state = %report.state,
            "Operation cleared gates"
        );

        Ok(OperationHandle {
            service: self.clone(),
            operation_id: ctx.operation_id,
            operation_type: ctx.operation_type,
            anchor_id: ctx.anchor_id,
            input: request.input,
            retention: request.retention,
            report,
        })
    }

    pub async fn get_record(&self, receipt_id: &ReceiptId) -> Result<ReceiptRecord, ReceiptError> {
        self.ledger
            .try_get_json(&Self::key(receipt_id))
            .await?
            .ok_or_else(|| ReceiptError::NotFound(receipt_id.clone()))
    }

    pub async fn get_receipt(&self, receipt_id: &ReceiptId) -> Result<Receipt, ReceiptError> {
        Ok(self.get_record(receipt_id).await?.receipt)
    }

    pub async fn contains(&self, receipt_id: &ReceiptId) -> Result<bool, ReceiptError> {
        Ok(self.ledger.contains(&Self::key(receipt_id)).await?)
    }

    /// Every receipt attached to `anchor_id`, oldest first.
    pub async fn receipts_for_anchor(
        &self,
        anchor_id: &AnchorId,
    ) -> Result<Vec<Receipt>, ReceiptError> {
        let records: Vec<ReceiptRecord> = self.ledger.list_json(RECEIPT_NAMESPACE).await?;
        let mut receipts: Vec<Receipt> = records
            .into_iter()
            .map(|r| r.receipt)
            .filter(|r| &r.anchor_id == anchor_id)
            .collect();
        receipts.sort_by(|a, b| {
            a.committed_at
                .cmp(&b.committed_at)
                .then_with(|| a.receipt_id.cmp(&b.receipt_id))
        });
        Ok(receipts)
    }

    /// Reconstruct and verify the full evidence for a receipt.
    ///
    /// Full-strength receipts are always re-verified from their stored
    /// capsule; a `supplied` payload must additionally equal it. Summary and
    /// reference receipts check the `supplied` payload and fail with
    /// `EvidenceRequired` without one. Any mismatch is an
    /// `IntegrityViolation`; nothing is repaired.
    pub async fn materialize(
        &self,
        receipt_id: &ReceiptId,
        supplied: Option<SuppliedEvidence>,
    ) -> Result<EvidenceCapsule, ReceiptError> {
        if let Some(cached) = self.cache.get(receipt_id) {
            let agrees = supplied
                .as_ref()
                .map_or(true, |s| s.input == cached.input && s.output == cached.output);
            if agrees {
                debug!(receipt_id = %receipt_id, "Materialization cache hit");
                return Ok(cached);
            }
        }

        let record = self.get_record(receipt_id).await?;
        let receipt = &record.receipt;
        if !receipt.verify_signature(&self.signer.verifying_key()) {
            warn!(receipt_id = %receipt_id, "Stored receipt failed signature check");
            return Err(ReceiptError::SignatureInvalid(receipt_id.clone()));
        }

        let violation = |part: &str| ReceiptError::IntegrityViolation {
            receipt_id: receipt_id.clone(),
            part: part.to_string(),
        };

        let (input, output, offered) = match (record.evidence, supplied) {
            (RetainedEvidence::Full { input, output }, supplied) => (input, output, supplied),
            (_, Some(supplied)) => (supplied.input, supplied.output, None),
            (_, None) => return Err(ReceiptError::EvidenceRequired(receipt_id.clone())),
        };

        for (part, payload, commitment) in [
            ("input", &input, &receipt.input_commitment),
            ("output", &output, &receipt.output_commitment),
        ] {
            if !self.engine.verify(payload, commitment) {
                warn!(
                    receipt_id = %receipt_id,
                    part,
                    expected = %commitment.digest.short(),
                    "Evidence does not match commitment"
                );
                return Err(violation(part));
            }
        }

        // Payloads handed in for a full receipt must agree with the capsule.
        if let Some(offered) = offered {
            let part = if offered.input != input {
                Some("input")
            } else if offered.output != output {
                Some("output")
            } else {
                None
            };
            if let Some(part) = part {
                warn!(
                    receipt_id = %receipt_id,
                    part,
                    "Supplied evidence differs from the stored capsule"
                );
                return Err(violation(part));
            }
        }

        let capsule = EvidenceCapsule {
            receipt_id: receipt_id.clone(),
            evidence_strength: receipt.evidence_strength,
            input,
            output,
        };
        self.cache.insert(capsule.clone());
        info!(
            receipt_id = %receipt_id,
            strength = %receipt.evidence_strength,
            "Evidence materialized"
        );
        Ok(capsule)
    }
}

impl std::fmt::Debug for ReceiptService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiptService")
            .field("signer", &self.signer)
            .field("algorithm", &self.engine.algorithm())
            .finish_non_exhaustive()
    }
}

/// A gated operation awaiting its output.
///
/// Nothing has been written yet. [`OperationHandle::finalize`] performs the
/// single ledger write; dropping the handle abandons the operation.
pub struct OperationHandle {
    service: ReceiptService,
    operation_id: OperationId,
    operation_type: OperationType,
    anchor_id: AnchorId,
    input: Vec<u8>,
    retention: Retention,
    report: GateReport,
}

impl OperationHandle {
    pub fn operation_id(&self) -> &OperationId {
        &self.operation_id
    }

    /// Gate outcome, including WARN findings.
    pub fn gate_report(&self) -> &GateReport {
        &self.report
    }

    /// Commit input and output, sign the receipt and write it once.
    pub async fn finalize(self, output: &[u8]) -> Result<Receipt, ReceiptError> {
        let service = &self.service;
        let mut receipt = Receipt {
            receipt_id: ReceiptId::generate(),
            operation_id: self.operation_id.clone(),
            operation_type: self.operation_type,
            anchor_id: self.anchor_id.clone(),
            committed_at: now(),
            input_commitment: service.engine.commit(&self.input),
            output_commitment: service.engine.commit(output),
            evidence_strength: self.retention.strength(),
            signature: SignatureBytes::from_bytes([0; 64]),
        };
        receipt.signature = service.signer.sign(&receipt.canonical_bytes());

        let record = ReceiptRecord {
            receipt: receipt.clone(),
            evidence: RetainedEvidence::retain(&self.retention, &self.input, output),
            gate_warnings: self.report.warnings().into_iter().cloned().collect(),
        };

        let key = ReceiptService::key(&receipt.receipt_id);
        service.ledger.put_json(&key, &record).await.map_err(|e| {
            if e.is_conflict() {
                ReceiptError::Conflict(receipt.receipt_id.clone())
            } else {
                e.into()
            }
        })?;

        info!(
            receipt_id = %receipt.receipt_id,
            operation_id = %receipt.operation_id,
            anchor_id = %receipt.anchor_id,
            operation_type = %receipt.operation_type,
            strength = %receipt.evidence_strength,
            warnings = record.gate_warnings.len(),
            "Receipt committed"
        );
        Ok(receipt)
    }
}

impl std::fmt::Debug for OperationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationHandle")
            .field("operation_id", &self.operation_id)
            .field("anchor_id", &self.anchor_id)
            .field("state", &self.report.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maple_audit_gate::{
        Enforcement, GateBinding, GatePipeline, GatePolicy, GateRegistry, StaticGate,
    };
    use maple_audit_types::{AnchorKind, EvidenceStrength};
    use serde_json::json;

    struct Fixture {
        ledger: WormLedger,
        anchors: AnchorManager,
        signer: Arc<ReceiptSigner>,
        service: ReceiptService,
        anchor: AnchorId,
    }

    async fn fixture(orchestrator: GateOrchestrator) -> Fixture {
        let ledger = WormLedger::in_memory();
        let anchors = AnchorManager::new(ledger.clone());
        let anchor = anchors
            .create_anchor(AnchorKind::Dataset, None)
            .await
            .unwrap()
            .anchor_id;
        let signer = Arc::new(ReceiptSigner::generate());
        let service = ReceiptService::new(
            ledger.clone(),
            anchors.clone(),
            orchestrator,
            CommitmentEngine::default(),
            signer.clone(),
        );
        Fixture {
            ledger,
            anchors,
            signer,
            service,
            anchor,
        }
    }

    fn open_gates() -> GateOrchestrator {
        GateOrchestrator::new(GatePipeline::empty())
    }

    fn request(anchor: &AnchorId, operation_type: OperationType, input: &[u8]) -> OperationRequest {
        OperationRequest::new(anchor.clone(), operation_type, input.to_vec())
    }

    async fn commit(service: &ReceiptService, request: OperationRequest, output: &[u8]) -> Receipt {
        service
            .begin_operation(request)
            .await
            .unwrap()
            .finalize(output)
            .await
            .unwrap()
    }

    fn supplied(input: &[u8], output: &[u8]) -> Option<SuppliedEvidence> {
        Some(SuppliedEvidence::new(input.to_vec(), output.to_vec()))
    }

    fn violated_part(err: &ReceiptError) -> Option<&str> {
        match err {
            ReceiptError::IntegrityViolation { part, .. } => Some(part.as_str()),
            _ => None,
        }
    }

    #[tokio::test]
    async fn finalize_writes_one_signed_receipt() {
        let fx = fixture(open_gates()).await;
        let handle = fx
            .service
            .begin_operation(request(&fx.anchor, OperationType::DatasetCreate, b"rows..."))
            .await
            .unwrap();
        let receipt = handle.finalize(b"ok").await.unwrap();

        assert!(receipt.verify_signature(&fx.service.verifying_key()));
        assert_eq!(receipt.evidence_strength, EvidenceStrength::Summary);
        let stored = fx.service.get_receipt(&receipt.receipt_id).await.unwrap();
        assert_eq!(stored, receipt);
        assert_eq!(
            fx.ledger.list_json::<ReceiptRecord>(RECEIPT_NAMESPACE).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn abandoned_handle_leaves_nothing() {
        let fx = fixture(open_gates()).await;
        let handle = fx
            .service
            .begin_operation(request(&fx.anchor, OperationType::Inference, b"in"))
            .await
            .unwrap();
        drop(handle);
        assert!(fx.service.receipts_for_anchor(&fx.anchor).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_anchor_is_rejected() {
        let fx = fixture(open_gates()).await;
        let missing = AnchorId::new("anc-missing");
        let err = fx
            .service
            .begin_operation(request(&missing, OperationType::Inference, b"in"))
            .await
            .unwrap_err();
        assert!(matches!(err, ReceiptError::Anchor(_)));
    }

    #[tokio::test]
    async fn blocked_operation_writes_nothing() {
        let registry = GateRegistry::with_builtins();
        let pipeline = GatePipeline::builder(&registry)
            .stage(
                "policy",
                vec![GateBinding::new(
                    StaticGate::NAME,
                    GatePolicy::new("deny", Enforcement::Blocking)
                        .with_settings(json!({ "status": "block", "reasons": ["frozen"] })),
                )],
            )
            .build()
            .unwrap();
        let fx = fixture(GateOrchestrator::new(pipeline)).await;

        let err = fx
            .service
            .begin_operation(request(&fx.anchor, OperationType::Inference, b"in"))
            .await
            .unwrap_err();
        assert_eq!(err.blocking_gates(), vec!["static"]);
        assert!(err.to_string().contains("frozen"));
        assert!(fx
            .ledger
            .list_json::<ReceiptRecord>(RECEIPT_NAMESPACE)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn warnings_are_kept_with_the_record() {
        let registry = GateRegistry::with_builtins();
        let pipeline = GatePipeline::builder(&registry)
            .stage(
                "policy",
                vec![GateBinding::new(
                    StaticGate::NAME,
                    GatePolicy::advisory("soft").with_settings(json!({ "status": "block" })),
                )],
            )
            .build()
            .unwrap();
        let fx = fixture(GateOrchestrator::new(pipeline)).await;
        let receipt = commit(
            &fx.service,
            request(&fx.anchor, OperationType::Inference, b"in"),
            b"out",
        )
        .await;
        let record = fx.service.get_record(&receipt.receipt_id).await.unwrap();
        assert_eq!(record.gate_warnings.len(), 1);
        assert_eq!(record.gate_warnings[0].policy_id, "soft");
    }

    #[tokio::test]
    async fn full_evidence_materializes_from_storage() {
        let fx = fixture(open_gates()).await;
        let request = request(&fx.anchor, OperationType::DatasetCreate, b"rows...")
            .with_retention(Retention::Full);
        let receipt = commit(&fx.service, request, b"manifest").await;

        let capsule = fx.service.materialize(&receipt.receipt_id, None).await.unwrap();
        assert_eq!(capsule.input, b"rows...".to_vec());
        assert_eq!(capsule.output, b"manifest".to_vec());
        assert_eq!(fx.service.cache().len(), 1);

        let err = fx
            .service
            .materialize(&receipt.receipt_id, supplied(b"rows..!", b"manifest"))
            .await
            .unwrap_err();
        assert_eq!(violated_part(&err), Some("input"));
    }

    #[tokio::test]
    async fn corrupt_full_capsule_is_caught_even_with_a_correct_payload() {
        let fx = fixture(open_gates()).await;
        let request = request(&fx.anchor, OperationType::DatasetCreate, b"rows...")
            .with_retention(Retention::Full);
        let receipt = commit(&fx.service, request, b"manifest").await;

        // Same signed receipt, but with the stored input altered.
        let mut record = fx.service.get_record(&receipt.receipt_id).await.unwrap();
        record.evidence = RetainedEvidence::Full {
            input: b"rows..!".to_vec(),
            output: b"manifest".to_vec(),
        };
        let corrupted = WormLedger::in_memory();
        corrupted
            .put_json(&ReceiptService::key(&receipt.receipt_id), &record)
            .await
            .unwrap();
        let service = ReceiptService::new(
            corrupted,
            fx.anchors.clone(),
            open_gates(),
            CommitmentEngine::default(),
            fx.signer.clone(),
        );

        let err = service.materialize(&receipt.receipt_id, None).await.unwrap_err();
        assert_eq!(violated_part(&err), Some("input"));
        let err = service
            .materialize(&receipt.receipt_id, supplied(b"rows...", b"manifest"))
            .await
            .unwrap_err();
        assert_eq!(violated_part(&err), Some("input"));
        assert!(service.cache().is_empty());
    }

    #[tokio::test]
    async fn summary_evidence_needs_matching_payload() {
        let fx = fixture(open_gates()).await;
        let receipt = commit(
            &fx.service,
            request(&fx.anchor, OperationType::Inference, b"prompt"),
            b"completion",
        )
        .await;
        let id = &receipt.receipt_id;

        let err = fx.service.materialize(id, None).await.unwrap_err();
        assert!(matches!(err, ReceiptError::EvidenceRequired(_)));

        let err = fx
            .service
            .materialize(id, supplied(b"prompt", b"forged"))
            .await
            .unwrap_err();
        assert_eq!(violated_part(&err), Some("output"));

        let capsule = fx
            .service
            .materialize(id, supplied(b"prompt", b"completion"))
            .await
            .unwrap();
        assert_eq!(capsule.evidence_strength, EvidenceStrength::Summary);

        // A cached capsule does not vouch for a different payload.
        let err = fx
            .service
            .materialize(id, supplied(b"other", b"completion"))
            .await
            .unwrap_err();
        assert_eq!(violated_part(&err), Some("input"));
    }

    #[tokio::test]
    async fn reference_evidence_needs_matching_payload() {
        let fx = fixture(open_gates()).await;
        let request = request(&fx.anchor, OperationType::ModelTrain, b"corpus")
            .with_retention(Retention::Reference {
                locator: "s3://evidence/run-7".into(),
            });
        let receipt = commit(&fx.service, request, b"weights").await;
        assert_eq!(receipt.evidence_strength, EvidenceStrength::Reference);
        let record = fx.service.get_record(&receipt.receipt_id).await.unwrap();
        assert_eq!(
            record.evidence,
            RetainedEvidence::Reference {
                locator: "s3://evidence/run-7".into()
            }
        );
        let id = &receipt.receipt_id;

        let err = fx.service.materialize(id, None).await.unwrap_err();
        assert!(matches!(err, ReceiptError::EvidenceRequired(_)));

        let err = fx
            .service
            .materialize(id, supplied(b"corpus", b"weights-v2"))
            .await
            .unwrap_err();
        assert_eq!(violated_part(&err), Some("output"));

        let capsule = fx
            .service
            .materialize(id, supplied(b"corpus", b"weights"))
            .await
            .unwrap();
        assert_eq!(capsule.evidence_strength, EvidenceStrength::Reference);
        assert_eq!(capsule.input, b"corpus".to_vec());
        assert_eq!(capsule.output, b"weights".to_vec());
    }

    #[tokio::test]
    async fn receipts_are_listed_per_anchor() {
        let fx = fixture(open_gates()).await;
        let other = fx
            .anchors
            .create_anchor(AnchorKind::Dataset, None)
            .await
            .unwrap()
            .anchor_id;

        let mut ids = Vec::new();
        for anchor in [&fx.anchor, &other, &fx.anchor] {
            let r = commit(&fx.service, request(anchor, OperationType::Other, b"x"), b"y").await;
            ids.push(r.receipt_id);
        }

        let listed: Vec<ReceiptId> = fx
            .service
            .receipts_for_anchor(&fx.anchor)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.receipt_id)
            .collect();
        assert_eq!(listed.len(), 2);
        assert!(listed.contains(&ids[0]) && listed.contains(&ids[2]));
    }

    #[tokio::test]
    async fn reference_retention_needs_a_locator() {
        let fx = fixture(open_gates()).await;
        let request = request(&fx.anchor, OperationType::Inference, b"x")
            .with_retention(Retention::Reference { locator: " ".into() });
        let err = fx.service.begin_operation(request).await.unwrap_err();
        assert!(matches!(err, ReceiptError::InvalidRequest(_)));
    }
}
