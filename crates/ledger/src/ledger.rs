use chartseal_types::{AmountMinor, PatientId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::LedgerError;

/// Kind of a ledger entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryKind {
    Charge,
    Payment,
}

/// One immutable charge or payment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub patient: PatientId,
    /// 1-based position in the patient's sequence.
    pub seq: u64,
    pub posted_at: DateTime<Utc>,
    pub description: String,
    pub kind: LedgerEntryKind,
    /// Always positive; the kind carries the sign.
    pub amount: AmountMinor,
    pub balance_after: AmountMinor,
}

/// Point-in-time view handed to the export collaborator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerStatement {
    pub patient: PatientId,
    pub entries: Vec<LedgerEntry>,
    pub closing_balance: AmountMinor,
}

/// Append-only ledger for one patient.
///
/// The engine serializes access per patient, which makes the
/// read-balance-then-append sequence atomic with respect to other
/// mutations on the same patient.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PatientLedger {
    patient: PatientId,
    entries: Vec<LedgerEntry>,
    /// Set when an integrity violation was detected; no further writes.
    halted: bool,
}

impl PatientLedger {
    pub fn new(patient: PatientId) -> Self {
        Self {
            patient,
            entries: Vec::new(),
            halted: false,
        }
    }

    pub fn patient(&self) -> PatientId {
        self.patient
    }

    /// Append a charge: `balance_after = previous + amount`.
    pub fn post_charge(
        &mut self,
        amount: AmountMinor,
        description: impl Into<String>,
    ) -> Result<&LedgerEntry, LedgerError> {
        self.post(LedgerEntryKind::Charge, amount, description.into())
    }

    /// Append a payment: `balance_after = previous - amount`. Driving the
    /// balance negative is allowed (overpayment credit).
    pub fn post_payment(
        &mut self,
        amount: AmountMinor,
        description: impl Into<String>,
    ) -> Result<&LedgerEntry, LedgerError> {
        self.post(LedgerEntryKind::Payment, amount, description.into())
    }

    /// Current balance: the last entry's `balance_after`, or zero.
    pub fn balance(&self) -> AmountMinor {
        self.entries.last().map(|e| e.balance_after).unwrap_or(0)
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Statement snapshot for export.
    pub fn statement(&self) -> LedgerStatement {
        LedgerStatement {
            patient: self.patient,
            entries: self.entries.clone(),
            closing_balance: self.balance(),
        }
    }

    /// Replay the balance chain and verify every prefix.
    ///
    /// A mismatch halts all further writes for this patient and surfaces
    /// `IntegrityViolation`; continuing to post against a broken chain
    /// would compound a forensic failure.
    pub fn verify(&mut self) -> Result<(), LedgerError> {
        let mut running: AmountMinor = 0;
        for (index, entry) in self.entries.iter().enumerate() {
            let expected_seq = (index + 1) as u64;
            if entry.seq != expected_seq {
                self.halted = true;
                error!(patient = %self.patient, seq = entry.seq, "ledger sequence mismatch");
                return Err(LedgerError::IntegrityViolation {
                    seq: entry.seq,
                    reason: format!("expected seq {}, found {}", expected_seq, entry.seq),
                });
            }
            if entry.amount <= 0 {
                self.halted = true;
                return Err(LedgerError::IntegrityViolation {
                    seq: entry.seq,
                    reason: format!("non-positive stored amount {}", entry.amount),
                });
            }
            let next = match entry.kind {
                LedgerEntryKind::Charge => running.checked_add(entry.amount),
                LedgerEntryKind::Payment => running.checked_sub(entry.amount),
            };
            let Some(next) = next else {
                // Posting refuses overflow, so a stored chain that overflows
                // on replay was edited behind the ledger's back.
                self.halted = true;
                error!(patient = %self.patient, seq = entry.seq, "ledger replay overflowed");
                return Err(LedgerError::IntegrityViolation {
                    seq: entry.seq,
                    reason: "balance chain overflows on replay".into(),
                });
            };
            running = next;
            if entry.balance_after != running {
                self.halted = true;
                error!(
                    patient = %self.patient,
                    seq = entry.seq,
                    expected = running,
                    stored = entry.balance_after,
                    "ledger balance chain does not reconcile"
                );
                return Err(LedgerError::IntegrityViolation {
                    seq: entry.seq,
                    reason: format!(
                        "balance_after {} does not reconcile, expected {}",
                        entry.balance_after, running
                    ),
                });
            }
        }
        Ok(())
    }

    fn post(
        &mut self,
        kind: LedgerEntryKind,
        amount: AmountMinor,
        description: String,
    ) -> Result<&LedgerEntry, LedgerError> {
        if self.halted {
            return Err(LedgerError::IntegrityViolation {
                seq: self.entries.len() as u64,
                reason: "ledger writes are halted after a prior integrity violation".into(),
            });
        }
        if amount <= 0 {
            return Err(LedgerError::NegativeOrZeroAmount { amount });
        }
        // Read-then-append; the chain is re-verified so tampering since the
        // last post is caught before it is built upon.
        self.verify()?;

        let previous = self.balance();
        let balance_after = match kind {
            LedgerEntryKind::Charge => previous.checked_add(amount),
            LedgerEntryKind::Payment => previous.checked_sub(amount),
        };
        // Overflow refuses the post but does not halt: the stored chain is
        // still intact.
        let Some(balance_after) = balance_after else {
            return Err(LedgerError::IntegrityViolation {
                seq: (self.entries.len() + 1) as u64,
                reason: format!("running balance would overflow from {previous} by {amount}"),
            });
        };
        let entry = LedgerEntry {
            patient: self.patient,
            seq: (self.entries.len() + 1) as u64,
            posted_at: Utc::now(),
            description,
            kind,
            amount,
            balance_after,
        };
        info!(
            patient = %self.patient,
            seq = entry.seq,
            ?kind,
            amount,
            balance_after,
            "ledger entry posted"
        );
        self.entries.push(entry);
        Ok(self
            .entries
            .last()
            .unwrap_or_else(|| unreachable!("entry just pushed")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ledger() -> PatientLedger {
        PatientLedger::new(PatientId::new())
    }

    #[test]
    fn charge_then_overpayment_leaves_credit() {
        let mut ledger = ledger();
        let first = ledger.post_charge(1500, "Cleaning").unwrap().clone();
        assert_eq!(first.balance_after, 1500);
        assert_eq!(ledger.balance(), 1500);

        let second = ledger.post_payment(2000, "Cash payment").unwrap().clone();
        assert_eq!(second.balance_after, -500);
        assert_eq!(ledger.balance(), -500);
        assert_eq!(ledger.entries().len(), 2);
    }

    #[test]
    fn zero_and_negative_amounts_are_refused() {
        let mut ledger = ledger();
        assert_eq!(
            ledger.post_charge(0, "noop").unwrap_err(),
            LedgerError::NegativeOrZeroAmount { amount: 0 }
        );
        assert_eq!(
            ledger.post_payment(-250, "bad").unwrap_err(),
            LedgerError::NegativeOrZeroAmount { amount: -250 }
        );
        assert!(ledger.entries().is_empty());
    }

    #[test]
    fn tampering_halts_further_writes() {
        let mut ledger = ledger();
        ledger.post_charge(1000, "Filling").unwrap();
        ledger.post_payment(400, "Partial payment").unwrap();

        ledger.entries[1].balance_after = 999;

        let error = ledger.post_charge(100, "after tamper").unwrap_err();
        assert!(matches!(error, LedgerError::IntegrityViolation { seq: 2, .. }));

        // Halted: even a clean-looking post is refused now.
        let error = ledger.post_payment(50, "still halted").unwrap_err();
        assert!(matches!(error, LedgerError::IntegrityViolation { .. }));
        assert_eq!(ledger.entries().len(), 2);
    }

    #[test]
    fn balance_overflow_is_refused_without_halting() {
        let mut ledger = ledger();
        ledger.post_charge(i64::MAX, "catastrophic billing import").unwrap();

        let error = ledger.post_charge(1, "one centavo too far").unwrap_err();
        assert!(matches!(error, LedgerError::IntegrityViolation { seq: 2, .. }));

        // The refusal appended nothing and the ledger still accepts posts.
        assert_eq!(ledger.entries().len(), 1);
        ledger.post_payment(1, "correction").unwrap();
        assert_eq!(ledger.balance(), i64::MAX - 1);
    }

    #[test]
    fn statement_snapshots_closing_balance() {
        let mut ledger = ledger();
        ledger.post_charge(800, "X-ray").unwrap();
        let statement = ledger.statement();
        ledger.post_payment(300, "GCash").unwrap();

        // The statement is a point-in-time copy, unaffected by later posts.
        assert_eq!(statement.closing_balance, 800);
        assert_eq!(statement.entries.len(), 1);
        assert_eq!(ledger.balance(), 500);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Charge(AmountMinor),
        Payment(AmountMinor),
    }

    fn op_strategy() -> impl Strategy<Value = Vec<Op>> {
        proptest::collection::vec(
            prop_oneof![
                (1i64..100_000).prop_map(Op::Charge),
                (1i64..100_000).prop_map(Op::Payment),
            ],
            0..64,
        )
    }

    proptest! {
        #[test]
        fn property_every_prefix_reconciles(ops in op_strategy()) {
            let mut ledger = PatientLedger::new(PatientId::new());
            for op in &ops {
                match op {
                    Op::Charge(amount) => {
                        ledger.post_charge(*amount, "charge").unwrap();
                    }
                    Op::Payment(amount) => {
                        ledger.post_payment(*amount, "payment").unwrap();
                    }
                }
            }

            let mut running: AmountMinor = 0;
            for (index, entry) in ledger.entries().iter().enumerate() {
                running = match entry.kind {
                    LedgerEntryKind::Charge => running + entry.amount,
                    LedgerEntryKind::Payment => running - entry.amount,
                };
                prop_assert_eq!(entry.balance_after, running);
                prop_assert_eq!(entry.seq, (index + 1) as u64);
            }
            prop_assert_eq!(ledger.balance(), running);
            ledger.verify().unwrap();
        }
    }
}
