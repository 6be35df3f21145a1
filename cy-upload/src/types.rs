use bytes::Bytes;
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Identifier the storage service assigns to a created content object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentId(String);

impl ContentId {
    /// Accept a remote identifier, rejecting blank ones
    pub fn parse<S: AsRef<str>>(raw: S) -> Option<Self> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Upload-task identifier handed out alongside a redirect target
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UploadSessionId(pub String);

impl UploadSessionId {
    pub fn from_string(id: String) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Header form expected by the upload endpoint: the raw id plus `-`
    pub fn header_value(&self) -> String {
        format!("{}-", self.0)
    }
}

impl std::fmt::Display for UploadSessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Content digest declared to the registration endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub String);

impl Fingerprint {
    /// Upper-case hex MD5 of `data`
    pub fn md5_of(data: &[u8]) -> Self {
        Self(format!("{:x}", md5::compute(data)).to_uppercase())
    }

    /// Fingerprint of an empty file
    pub fn empty() -> Self {
        Self::md5_of(&[])
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Declaration of one content object, built per session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadDescriptor {
    pub fingerprint: Fingerprint,
    pub declared_size: u64,
    pub extension: String,
    pub display_name: String,
    pub parent_location: String,
    /// `YYYYMMDDHHMMSS`, the format the storage service expects
    pub created_at: String,
    pub manual_rename: u8,
}

/// What the registration endpoint answered
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationResult {
    pub content_id: Option<ContentId>,
    pub redirect_target: Option<Url>,
    pub session_id: Option<UploadSessionId>,
}

impl RegistrationResult {
    /// Redirect target and upload session, when a transfer has to follow
    pub fn transfer_target(&self) -> Option<(&Url, &UploadSessionId)> {
        match (&self.redirect_target, &self.session_id) {
            (Some(url), Some(session)) => Some((url, session)),
            _ => None,
        }
    }

    pub fn requires_transfer(&self) -> bool {
        self.transfer_target().is_some()
    }
}

/// Result of a streamed transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    pub success: bool,
    pub content_id: Option<ContentId>,
}

impl TransferOutcome {
    pub fn succeeded(content_id: Option<ContentId>) -> Self {
        Self {
            success: true,
            content_id,
        }
    }

    pub fn rejected() -> Self {
        Self {
            success: false,
            content_id: None,
        }
    }
}

/// How one session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Registration alone created the object
    Registered { content_id: ContentId },
    /// Registration asked for a transfer and the transfer went through
    Transferred { content_id: Option<ContentId> },
    Failed { reason: String },
}

impl SessionOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, SessionOutcome::Failed { .. })
    }

    pub fn content_id(&self) -> Option<&ContentId> {
        match self {
            SessionOutcome::Registered { content_id } => Some(content_id),
            SessionOutcome::Transferred { content_id } => content_id.as_ref(),
            SessionOutcome::Failed { .. } => None,
        }
    }
}

/// Identity of the first successful session of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinnedIdentity {
    pub fingerprint: Fingerprint,
    pub declared_size: u64,
    /// Trailer the payload was built from, so the same bytes can be sent again
    pub trailer: Bytes,
}

/// Planning state of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaPlan {
    pub needed_units: u64,
    pub remaining_bytes: u64,
    pub session_cap_bytes: u64,
    pub sessions_required: u64,
    carried: Option<PinnedIdentity>,
}

impl QuotaPlan {
    pub fn new(needed_units: u64, unit_bytes: u64, step_units: u64, session_cap_bytes: u64) -> Self {
        Self {
            needed_units,
            remaining_bytes: needed_units.saturating_mul(unit_bytes),
            session_cap_bytes,
            sessions_required: needed_units.div_ceil(step_units.max(1)),
            carried: None,
        }
    }

    /// Keep the identity of the first success; later calls are ignored.
    /// Returns whether this call pinned it.
    pub fn pin(&mut self, identity: PinnedIdentity) -> bool {
        if self.carried.is_some() {
            return false;
        }
        self.carried = Some(identity);
        true
    }

    pub fn carried(&self) -> Option<&PinnedIdentity> {
        self.carried.as_ref()
    }

    pub fn carried_fingerprint(&self) -> Option<&Fingerprint> {
        self.carried.as_ref().map(|c| &c.fingerprint)
    }

    pub fn carried_size(&self) -> Option<u64> {
        self.carried.as_ref().map(|c| c.declared_size)
    }
}

/// Record of one session inside a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub index: u64,
    pub fingerprint: Fingerprint,
    pub declared_size: u64,
    pub outcome: SessionOutcome,
}

/// Everything a run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanReport {
    pub plan: QuotaPlan,
    pub sessions: Vec<SessionReport>,
}

impl PlanReport {
    pub fn succeeded(&self) -> usize {
        self.sessions.iter().filter(|s| s.outcome.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.sessions.len() - self.succeeded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_id_rejects_blank() {
        assert!(ContentId::parse("").is_none());
        assert!(ContentId::parse("   ").is_none());
        assert_eq!(ContentId::parse(" abc ").unwrap().as_str(), "abc");
    }

    #[test]
    fn test_session_header_value() {
        let id = UploadSessionId::from_string("task42".to_string());
        assert_eq!(id.header_value(), "task42-");
    }

    #[test]
    fn test_empty_fingerprint() {
        assert_eq!(Fingerprint::empty().as_str(), "D41D8CD98F00B204E9800998ECF8427E");
    }

    #[test]
    fn test_plan_pins_first_identity_only() {
        let mut plan = QuotaPlan::new(600, 1024, 200, 4096);
        assert_eq!(plan.sessions_required, 3);
        assert_eq!(plan.remaining_bytes, 600 * 1024);

        let first = PinnedIdentity {
            fingerprint: Fingerprint("AAA".to_string()),
            declared_size: 100,
            trailer: Bytes::from_static(b"first"),
        };
        let second = PinnedIdentity {
            fingerprint: Fingerprint("BBB".to_string()),
            declared_size: 200,
            trailer: Bytes::from_static(b"second"),
        };

        assert!(plan.pin(first));
        assert!(!plan.pin(second));
        assert_eq!(plan.carried_fingerprint().unwrap().as_str(), "AAA");
        assert_eq!(plan.carried_size(), Some(100));
    }

    #[test]
    fn test_registration_transfer_target_needs_both_parts() {
        let url = Url::parse("https://upload.example/put").unwrap();
        let only_url = RegistrationResult {
            redirect_target: Some(url.clone()),
            ..Default::default()
        };
        assert!(!only_url.requires_transfer());

        let full = RegistrationResult {
            redirect_target: Some(url),
            session_id: Some(UploadSessionId::from_string("t".to_string())),
            content_id: None,
        };
        assert!(full.requires_transfer());
    }
}
