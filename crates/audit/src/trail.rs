use std::sync::RwLock;

use chartseal_types::PatientId;
use tracing::{debug, warn};

use crate::error::AuditError;
use crate::record::{AuditRecord, AuditRecordInput, AuditRecordKind};

/// External collaborator notified after each append.
///
/// Notification is fire-and-forget: an `Err` is logged and ignored, and the
/// core mutation the record describes is never rolled back.
pub trait AuditSubscriber: Send + Sync {
    /// Which record kinds this subscriber cares about.
    fn wants(&self, kind: AuditRecordKind) -> bool;

    fn on_record(&self, record: &AuditRecord) -> Result<(), String>;
}

/// Result of replaying the hash chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainVerification {
    pub valid: bool,
    pub total_records: usize,
    pub first_invalid_index: Option<usize>,
    pub detail: Option<String>,
}

/// The shared, append-only audit trail.
///
/// Interior locking so one trail can sit behind an `Arc` across all
/// per-patient cells; appends from different patients interleave but each
/// append is atomic and chained in trail order.
pub struct AuditTrail {
    records: RwLock<Vec<AuditRecord>>,
    subscribers: Vec<Box<dyn AuditSubscriber>>,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            subscribers: Vec::new(),
        }
    }

    /// Register a subscriber. Done at construction time, before the trail
    /// is shared.
    pub fn with_subscriber(mut self, subscriber: Box<dyn AuditSubscriber>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Append one record, chaining it to the current head, then fan out to
    /// interested subscribers.
    pub fn append(&self, input: AuditRecordInput) -> Result<AuditRecord, AuditError> {
        let record = {
            let mut records = self.records.write().map_err(|_| AuditError::LockPoisoned)?;
            let previous_hash = records.last().map(|r| r.record_hash.clone());
            let record = input.finalize(previous_hash);
            records.push(record.clone());
            record
        };
        debug!(kind = ?record.kind, entity = %record.entity_id, "audit record appended");

        // Fan-out happens outside the lock; a slow or failing subscriber
        // must not block or roll back anything.
        for subscriber in &self.subscribers {
            if subscriber.wants(record.kind) {
                if let Err(reason) = subscriber.on_record(&record) {
                    warn!(kind = ?record.kind, reason, "audit subscriber failed; ignored");
                }
            }
        }
        Ok(record)
    }

    /// Every record, oldest first.
    pub fn records(&self) -> Result<Vec<AuditRecord>, AuditError> {
        Ok(self
            .records
            .read()
            .map_err(|_| AuditError::LockPoisoned)?
            .clone())
    }

    /// Records concerning one patient, oldest first.
    pub fn records_for(&self, patient: PatientId) -> Result<Vec<AuditRecord>, AuditError> {
        Ok(self
            .records
            .read()
            .map_err(|_| AuditError::LockPoisoned)?
            .iter()
            .filter(|record| record.patient == patient)
            .cloned()
            .collect())
    }

    /// Replay the chain: recompute every hash and check every link.
    pub fn verify_chain(&self) -> Result<ChainVerification, AuditError> {
        let records = self.records.read().map_err(|_| AuditError::LockPoisoned)?;
        for (index, record) in records.iter().enumerate() {
            if record.recompute_hash() != record.record_hash {
                return Ok(ChainVerification {
                    valid: false,
                    total_records: records.len(),
                    first_invalid_index: Some(index),
                    detail: Some(format!("record {} has an invalid hash", record.id)),
                });
            }
            let expected_prev = if index == 0 {
                None
            } else {
                Some(records[index - 1].record_hash.as_str())
            };
            if record.previous_hash.as_deref() != expected_prev {
                return Ok(ChainVerification {
                    valid: false,
                    total_records: records.len(),
                    first_invalid_index: Some(index),
                    detail: Some(format!("record {} has a broken chain link", record.id)),
                });
            }
        }
        Ok(ChainVerification {
            valid: true,
            total_records: records.len(),
            first_invalid_index: None,
            detail: None,
        })
    }
}

impl Default for AuditTrail {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use chartseal_types::ActorId;

    use super::*;
    use crate::record::AuditEntityKind;

    fn input(kind: AuditRecordKind, patient: PatientId) -> AuditRecordInput {
        AuditRecordInput {
            actor: ActorId::new("frontdesk-2"),
            kind,
            entity_kind: AuditEntityKind::Consent,
            entity_id: "clinical".into(),
            patient,
            detail: "test".into(),
        }
    }

    #[test]
    fn appends_chain_and_verify() {
        let trail = AuditTrail::new();
        let patient = PatientId::new();
        trail.append(input(AuditRecordKind::ConsentGranted, patient)).unwrap();
        trail.append(input(AuditRecordKind::ConsentRevoked, patient)).unwrap();
        trail.append(input(AuditRecordKind::OverrideUsed, patient)).unwrap();

        let verification = trail.verify_chain().unwrap();
        assert!(verification.valid);
        assert_eq!(verification.total_records, 3);

        let records = trail.records().unwrap();
        assert_eq!(records[1].previous_hash, Some(records[0].record_hash.clone()));
        assert_eq!(records[2].previous_hash, Some(records[1].record_hash.clone()));
    }

    #[test]
    fn tampering_is_detected() {
        let trail = AuditTrail::new();
        let patient = PatientId::new();
        trail.append(input(AuditRecordKind::ConsentGranted, patient)).unwrap();
        trail.append(input(AuditRecordKind::ConsentRevoked, patient)).unwrap();

        trail.records.write().unwrap()[0].detail = "rewritten history".into();

        let verification = trail.verify_chain().unwrap();
        assert!(!verification.valid);
        assert_eq!(verification.first_invalid_index, Some(0));
    }

    #[test]
    fn reattributing_a_record_to_another_patient_is_detected() {
        let trail = AuditTrail::new();
        let patient = PatientId::new();
        trail.append(input(AuditRecordKind::ConsentGranted, patient)).unwrap();
        trail.append(input(AuditRecordKind::ConsentRevoked, patient)).unwrap();

        trail.records.write().unwrap()[1].patient = PatientId::new();

        let verification = trail.verify_chain().unwrap();
        assert!(!verification.valid);
        assert_eq!(verification.first_invalid_index, Some(1));
    }

    #[test]
    fn records_for_filters_by_patient() {
        let trail = AuditTrail::new();
        let alice = PatientId::new();
        let bob = PatientId::new();
        trail.append(input(AuditRecordKind::ConsentGranted, alice)).unwrap();
        trail.append(input(AuditRecordKind::ConsentGranted, bob)).unwrap();
        trail.append(input(AuditRecordKind::ConsentRevoked, alice)).unwrap();

        assert_eq!(trail.records_for(alice).unwrap().len(), 2);
        assert_eq!(trail.records_for(bob).unwrap().len(), 1);
    }

    struct CountingSubscriber {
        seen: Arc<AtomicUsize>,
        fail: bool,
    }

    impl AuditSubscriber for CountingSubscriber {
        fn wants(&self, kind: AuditRecordKind) -> bool {
            kind == AuditRecordKind::ConsentRevoked
        }

        fn on_record(&self, _record: &AuditRecord) -> Result<(), String> {
            self.seen.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err("sms gateway unreachable".into())
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn subscribers_see_only_wanted_kinds_and_failures_are_ignored() {
        let seen = Arc::new(AtomicUsize::new(0));
        let trail = AuditTrail::new().with_subscriber(Box::new(CountingSubscriber {
            seen: Arc::clone(&seen),
            fail: true,
        }));

        let patient = PatientId::new();
        trail.append(input(AuditRecordKind::ConsentGranted, patient)).unwrap();
        let appended = trail.append(input(AuditRecordKind::ConsentRevoked, patient));

        // The failing subscriber did not prevent the append.
        assert!(appended.is_ok());
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(trail.records().unwrap().len(), 2);
    }
}
