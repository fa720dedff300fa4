use chartseal_types::{ActorId, ConsentCategory, ConsentStatus, PatientId};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ConsentError;
use crate::event::{ConsentEvent, ConsentEventKind};

/// Append-only consent event log for one patient.
///
/// Owned by the patient's aggregate cell; the engine serializes access, so
/// the log itself carries no locking.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConsentLog {
    patient: PatientId,
    events: Vec<ConsentEvent>,
}

impl ConsentLog {
    pub fn new(patient: PatientId) -> Self {
        Self {
            patient,
            events: Vec::new(),
        }
    }

    pub fn patient(&self) -> PatientId {
        self.patient
    }

    /// Record a grant for one category.
    pub fn grant(
        &mut self,
        category: ConsentCategory,
        actor: ActorId,
        policy_version: impl Into<String>,
    ) -> &ConsentEvent {
        let event = ConsentEvent {
            patient: self.patient,
            category,
            kind: ConsentEventKind::Granted,
            policy_version: policy_version.into(),
            recorded_at: Utc::now(),
            actor,
            note: None,
        };
        info!(patient = %self.patient, ?category, "consent granted");
        self.events.push(event);
        self.events.last().unwrap_or_else(|| unreachable!("event just pushed"))
    }

    /// Record a revoke for one category.
    ///
    /// Revoking `Clinical` locks all clinical mutation for the patient, so
    /// it must arrive with `acknowledged == true` (the calling UI has made
    /// the staff member re-type the confirmation token). Marketing and
    /// third-party revokes are advisory and need no acknowledgement.
    pub fn revoke(
        &mut self,
        category: ConsentCategory,
        actor: ActorId,
        reason: Option<String>,
        acknowledged: bool,
    ) -> Result<&ConsentEvent, ConsentError> {
        if category == ConsentCategory::Clinical && !acknowledged {
            warn!(patient = %self.patient, "clinical consent revoke without acknowledgement refused");
            return Err(ConsentError::InvalidConsentConfirmation { category });
        }

        let event = ConsentEvent {
            patient: self.patient,
            category,
            kind: ConsentEventKind::Revoked,
            policy_version: self.latest_policy_version(category),
            recorded_at: Utc::now(),
            actor,
            note: reason,
        };
        info!(patient = %self.patient, ?category, "consent revoked");
        self.events.push(event);
        Ok(self
            .events
            .last()
            .unwrap_or_else(|| unreachable!("event just pushed")))
    }

    /// Derived current status: the most recent event for the category wins.
    pub fn status_of(&self, category: ConsentCategory) -> ConsentStatus {
        self.events
            .iter()
            .filter(|event| event.category == category)
            .max_by_key(|event| event.recorded_at)
            .map(|event| event.kind.as_status())
            .unwrap_or(ConsentStatus::None)
    }

    /// Full event history for one category, oldest first.
    pub fn history(&self, category: ConsentCategory) -> Vec<&ConsentEvent> {
        self.events
            .iter()
            .filter(|event| event.category == category)
            .collect()
    }

    /// Every event ever recorded, oldest first.
    pub fn events(&self) -> &[ConsentEvent] {
        &self.events
    }

    /// Policy version attached to the most recent event for the category.
    /// A revoke with no prior grant carries an empty version.
    fn latest_policy_version(&self, category: ConsentCategory) -> String {
        self.events
            .iter()
            .filter(|event| event.category == category)
            .max_by_key(|event| event.recorded_at)
            .map(|event| event.policy_version.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor() -> ActorId {
        ActorId::new("frontdesk-1")
    }

    #[test]
    fn status_defaults_to_none() {
        let log = ConsentLog::new(PatientId::new());
        assert_eq!(log.status_of(ConsentCategory::Clinical), ConsentStatus::None);
    }

    #[test]
    fn latest_event_wins() {
        let mut log = ConsentLog::new(PatientId::new());
        log.grant(ConsentCategory::Clinical, actor(), "v3");
        assert_eq!(
            log.status_of(ConsentCategory::Clinical),
            ConsentStatus::Granted
        );

        log.revoke(ConsentCategory::Clinical, actor(), None, true)
            .unwrap();
        assert_eq!(
            log.status_of(ConsentCategory::Clinical),
            ConsentStatus::Revoked
        );

        log.grant(ConsentCategory::Clinical, actor(), "v3");
        assert_eq!(
            log.status_of(ConsentCategory::Clinical),
            ConsentStatus::Granted
        );
    }

    #[test]
    fn clinical_revoke_requires_acknowledgement() {
        let mut log = ConsentLog::new(PatientId::new());
        log.grant(ConsentCategory::Clinical, actor(), "v3");

        let error = log
            .revoke(ConsentCategory::Clinical, actor(), None, false)
            .unwrap_err();
        assert_eq!(
            error,
            ConsentError::InvalidConsentConfirmation {
                category: ConsentCategory::Clinical
            }
        );
        // Refusal left the log untouched.
        assert_eq!(
            log.status_of(ConsentCategory::Clinical),
            ConsentStatus::Granted
        );
        assert_eq!(log.events().len(), 1);
    }

    #[test]
    fn advisory_revokes_need_no_acknowledgement() {
        let mut log = ConsentLog::new(PatientId::new());
        log.grant(ConsentCategory::Marketing, actor(), "v3");
        log.revoke(ConsentCategory::Marketing, actor(), None, false)
            .unwrap();
        assert_eq!(
            log.status_of(ConsentCategory::Marketing),
            ConsentStatus::Revoked
        );
        // Marketing revocation does not touch clinical status.
        assert_eq!(log.status_of(ConsentCategory::Clinical), ConsentStatus::None);
    }

    #[test]
    fn history_is_append_only_per_category() {
        let mut log = ConsentLog::new(PatientId::new());
        log.grant(ConsentCategory::Clinical, actor(), "v1");
        log.grant(ConsentCategory::Marketing, actor(), "v1");
        log.revoke(ConsentCategory::Clinical, actor(), Some("moved away".into()), true)
            .unwrap();

        let clinical = log.history(ConsentCategory::Clinical);
        assert_eq!(clinical.len(), 2);
        assert_eq!(clinical[0].kind, ConsentEventKind::Granted);
        assert_eq!(clinical[1].kind, ConsentEventKind::Revoked);
        assert_eq!(clinical[1].note.as_deref(), Some("moved away"));
    }
}
