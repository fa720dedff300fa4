use serde::{Deserialize, Serialize};

/// Staff roles recognized by the access gate.
///
/// `IntegrityAuditor` is the designated audit-override role: the only role
/// permitted to act on a patient whose clinical consent has been revoked,
/// and every such use is audit-logged unconditionally.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Clinician,
    Hygienist,
    FrontDesk,
    Billing,
    IntegrityAuditor,
}

impl ActorRole {
    /// Whether this role may bypass a clinical-consent revocation lock.
    pub fn is_audit_override(&self) -> bool {
        matches!(self, Self::IntegrityAuditor)
    }
}

/// A staff member as seen by the core: identity plus role.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: crate::ids::ActorId,
    pub role: ActorRole,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: ActorRole) -> Self {
        Self {
            id: crate::ids::ActorId::new(id),
            role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_integrity_auditor_overrides() {
        assert!(ActorRole::IntegrityAuditor.is_audit_override());
        assert!(!ActorRole::Clinician.is_audit_override());
        assert!(!ActorRole::FrontDesk.is_audit_override());
        assert!(!ActorRole::Billing.is_audit_override());
        assert!(!ActorRole::Hygienist.is_audit_override());
    }
}
