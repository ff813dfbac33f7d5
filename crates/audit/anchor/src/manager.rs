use std::collections::HashSet;

use maple_audit_ledger::{LedgerKey, WormLedger};
use maple_audit_types::{now, AnchorId, AnchorKind};
use tracing::{debug, info, warn};

use crate::error::AnchorError;
use crate::model::Anchor;

/// Ledger namespace holding anchor records.
pub const ANCHOR_NAMESPACE: &str = "anchor";

/// Creates and resolves anchors. Every anchor is one write-once ledger
/// record; nothing here updates or deletes.
#[derive(Clone, Debug)]
pub struct AnchorManager {
    ledger: WormLedger,
}

impl AnchorManager {
    pub fn new(ledger: WormLedger) -> Self {
        Self { ledger }
    }

    fn key(id: &AnchorId) -> LedgerKey {
        LedgerKey::new(ANCHOR_NAMESPACE, id.as_str())
    }

    /// Create an anchor with a freshly generated id.
    pub async fn create_anchor(
        &self,
        kind: AnchorKind,
        parent: Option<&AnchorId>,
    ) -> Result<Anchor, AnchorError> {
        let anchor_id = AnchorId::generate();
        self.validate_parent(&anchor_id, kind, parent).await?;
        let anchor = Anchor {
            anchor_id,
            kind,
            created_at: now(),
            parent_anchor_id: parent.cloned(),
            supersedes: None,
        };
        self.write(anchor).await
    }

    /// Create an anchor under a caller-chosen id.
    ///
    /// Repeating the call with the same kind and parent returns the stored
    /// anchor unchanged; any other attributes under an existing id are a
    /// `Conflict`.
    pub async fn create_anchor_with_id(
        &self,
        anchor_id: AnchorId,
        kind: AnchorKind,
        parent: Option<&AnchorId>,
    ) -> Result<Anchor, AnchorError> {
        if anchor_id.is_empty() {
            return Err(AnchorError::InvalidId(anchor_id.to_string()));
        }
        self.validate_parent(&anchor_id, kind, parent).await?;
        let anchor = Anchor {
            anchor_id,
            kind,
            created_at: now(),
            parent_anchor_id: parent.cloned(),
            supersedes: None,
        };
        self.write(anchor).await
    }

    pub async fn get_anchor(&self, anchor_id: &AnchorId) -> Result<Anchor, AnchorError> {
        self.ledger
            .try_get_json(&Self::key(anchor_id))
            .await?
            .ok_or_else(|| AnchorError::NotFound(anchor_id.clone()))
    }

    pub async fn exists(&self, anchor_id: &AnchorId) -> Result<bool, AnchorError> {
        Ok(self.ledger.contains(&Self::key(anchor_id)).await?)
    }

    /// The anchor followed by its ancestors, nearest first.
    pub async fn lineage(&self, anchor_id: &AnchorId) -> Result<Vec<Anchor>, AnchorError> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(anchor_id.clone());
        while let Some(id) = next {
            if !seen.insert(id.clone()) {
                return Err(AnchorError::LineageCycle(anchor_id.clone()));
            }
            let anchor = self.get_anchor(&id).await?;
            next = anchor.parent_anchor_id.clone();
            chain.push(anchor);
        }
        Ok(chain)
    }

    /// Retire `retired` by creating a new anchor of the same kind that
    /// supersedes it. A model successor keeps the retired model's dataset
    /// parent; a dataset successor is a new root.
    pub async fn successor(&self, retired: &AnchorId) -> Result<Anchor, AnchorError> {
        let old = self.get_anchor(retired).await?;
        let anchor = Anchor {
            anchor_id: AnchorId::generate(),
            kind: old.kind,
            created_at: now(),
            parent_anchor_id: old.parent_anchor_id.clone(),
            supersedes: Some(old.anchor_id.clone()),
        };
        let anchor = self.write(anchor).await?;
        info!(
            anchor_id = %anchor.anchor_id,
            supersedes = %retired,
            "Anchor superseded"
        );
        Ok(anchor)
    }

    async fn validate_parent(
        &self,
        anchor_id: &AnchorId,
        kind: AnchorKind,
        parent: Option<&AnchorId>,
    ) -> Result<(), AnchorError> {
        let invalid = |reason: String| AnchorError::InvalidParent {
            anchor_id: anchor_id.clone(),
            reason,
        };
        match (kind, parent) {
            (AnchorKind::Dataset, Some(p)) => Err(invalid(format!(
                "dataset anchors have no parent (got {})",
                p
            ))),
            (AnchorKind::Dataset, None) | (AnchorKind::Model, None) => Ok(()),
            (AnchorKind::Model, Some(p)) => {
                let parent = match self.get_anchor(p).await {
                    Ok(a) => a,
                    Err(AnchorError::NotFound(_)) => {
                        return Err(invalid(format!("parent {} does not exist", p)))
                    }
                    Err(e) => return Err(e),
                };
                if !parent.is_dataset() {
                    return Err(invalid(format!(
                        "parent {} is a {}, models descend only from datasets",
                        p, parent.kind
                    )));
                }
                Ok(())
            }
        }
    }

    async fn write(&self, anchor: Anchor) -> Result<Anchor, AnchorError> {
        let key = Self::key(&anchor.anchor_id);
        match self.ledger.put_json(&key, &anchor).await {
            Ok(()) => {
                info!(
                    anchor_id = %anchor.anchor_id,
                    kind = %anchor.kind,
                    parent = ?anchor.parent_anchor_id.as_ref().map(|p| p.as_str()),
                    "Anchor created"
                );
                Ok(anchor)
            }
            Err(e) if e.is_conflict() => {
                let existing = self.get_anchor(&anchor.anchor_id).await?;
                if existing.same_identity(&anchor) {
                    debug!(anchor_id = %anchor.anchor_id, "Anchor already exists, reusing");
                    Ok(existing)
                } else {
                    warn!(
                        anchor_id = %anchor.anchor_id,
                        "Anchor id reused with different attributes"
                    );
                    Err(AnchorError::Conflict(anchor.anchor_id))
                }
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> AnchorManager {
        AnchorManager::new(WormLedger::in_memory())
    }

    #[tokio::test]
    async fn dataset_anchor_roundtrip() {
        let mgr = manager();
        let ds = mgr
            .create_anchor_with_id(AnchorId::new("ds-2025-10"), AnchorKind::Dataset, None)
            .await
            .unwrap();
        let loaded = mgr.get_anchor(&AnchorId::new("ds-2025-10")).await.unwrap();
        assert_eq!(loaded, ds);
        assert_eq!(loaded.kind, AnchorKind::Dataset);
    }

    #[tokio::test]
    async fn generated_ids_are_unique() {
        let mgr = manager();
        let a = mgr.create_anchor(AnchorKind::Dataset, None).await.unwrap();
        let b = mgr.create_anchor(AnchorKind::Dataset, None).await.unwrap();
        assert_ne!(a.anchor_id, b.anchor_id);
        assert!(a.anchor_id.as_str().starts_with("anc-"));
    }

    #[tokio::test]
    async fn model_must_descend_from_existing_dataset() {
        let mgr = manager();
        let ds = mgr.create_anchor(AnchorKind::Dataset, None).await.unwrap();
        let model = mgr
            .create_anchor(AnchorKind::Model, Some(&ds.anchor_id))
            .await
            .unwrap();
        assert_eq!(model.parent_anchor_id.as_ref(), Some(&ds.anchor_id));

        let missing = mgr
            .create_anchor(AnchorKind::Model, Some(&AnchorId::new("anc-nope")))
            .await;
        assert!(matches!(missing, Err(AnchorError::InvalidParent { .. })));

        let from_model = mgr
            .create_anchor(AnchorKind::Model, Some(&model.anchor_id))
            .await;
        assert!(matches!(from_model, Err(AnchorError::InvalidParent { .. })));
    }

    #[tokio::test]
    async fn datasets_reject_parents() {
        let mgr = manager();
        let ds = mgr.create_anchor(AnchorKind::Dataset, None).await.unwrap();
        let err = mgr
            .create_anchor(AnchorKind::Dataset, Some(&ds.anchor_id))
            .await
            .unwrap_err();
        assert!(matches!(err, AnchorError::InvalidParent { .. }));
    }

    #[tokio::test]
    async fn explicit_id_is_idempotent_but_not_rewritable() {
        let mgr = manager();
        let first = mgr
            .create_anchor_with_id(AnchorId::new("ds-a"), AnchorKind::Dataset, None)
            .await
            .unwrap();
        let again = mgr
            .create_anchor_with_id(AnchorId::new("ds-a"), AnchorKind::Dataset, None)
            .await
            .unwrap();
        assert_eq!(first, again);

        let err = mgr
            .create_anchor_with_id(AnchorId::new("ds-a"), AnchorKind::Model, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AnchorError::Conflict(_)));
        assert_eq!(
            mgr.get_anchor(&AnchorId::new("ds-a")).await.unwrap().kind,
            AnchorKind::Dataset
        );
    }

    #[tokio::test]
    async fn lineage_walks_to_root() {
        let mgr = manager();
        let ds = mgr.create_anchor(AnchorKind::Dataset, None).await.unwrap();
        let model = mgr
            .create_anchor(AnchorKind::Model, Some(&ds.anchor_id))
            .await
            .unwrap();
        let chain = mgr.lineage(&model.anchor_id).await.unwrap();
        let ids: Vec<_> = chain.iter().map(|a| a.anchor_id.clone()).collect();
        assert_eq!(ids, vec![model.anchor_id, ds.anchor_id]);
    }

    #[tokio::test]
    async fn successor_retires_without_mutation() {
        let mgr = manager();
        let ds = mgr.create_anchor(AnchorKind::Dataset, None).await.unwrap();
        let v1 = mgr
            .create_anchor(AnchorKind::Model, Some(&ds.anchor_id))
            .await
            .unwrap();
        let v2 = mgr.successor(&v1.anchor_id).await.unwrap();

        assert_eq!(v2.kind, AnchorKind::Model);
        assert_eq!(v2.supersedes.as_ref(), Some(&v1.anchor_id));
        assert_eq!(v2.parent_anchor_id.as_ref(), Some(&ds.anchor_id));
        assert_eq!(mgr.get_anchor(&v1.anchor_id).await.unwrap(), v1);
    }
}
