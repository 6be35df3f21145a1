use std::time::Duration;

use cy_core::CyConfigSnapshot;

use crate::{UploadError, UploadResult};

/// Remote folder every synthetic upload lands in.
pub const DEFAULT_PARENT_LOCATION: &str = "00019700101000000001";

/// Registration endpoint of the storage service.
pub const DEFAULT_REGISTRATION_ENDPOINT: &str =
    "https://ose.caiyun.feixin.10086.cn/richlifeApp/devapp/IUploadAndDownload";

const MIB: u64 = 1024 * 1024;

/// Configuration for synthetic bulk uploads
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Size of each zero-filled chunk handed to the transport
    pub chunk_size: usize,

    /// Zero bytes preceding the random trailer in a synthetic payload
    pub zero_prefix_bytes: u64,

    /// Length of the random trailer that makes each payload unique
    pub trailer_len: usize,

    /// Largest size a single session may declare
    pub session_cap_bytes: u64,

    /// Quota denomination: the run aims at `quota_target_units` units of
    /// `quota_unit_bytes`, advancing `quota_step_units` per session
    pub quota_target_units: u64,
    pub quota_unit_bytes: u64,
    pub quota_step_units: u64,

    /// Pause between two sessions
    pub throttle: Duration,

    /// Upper bound for a registration call
    pub request_timeout: Duration,

    /// Longest silence tolerated on a transfer connection
    pub transfer_idle_timeout: Duration,

    /// Optional bound on a whole transfer, body included
    pub transfer_timeout: Option<Duration>,

    pub parent_location: String,
    pub extension: String,
    pub name_prefix: String,
    pub manual_rename: u8,

    pub registration_endpoint: String,

    /// Headers identifying the client to the storage service
    pub identity: ClientIdentity,

    /// When false the planner skips the upload task entirely
    pub streaming_supported: bool,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: 64 * 1024, // 64KB
            zero_prefix_bytes: 200 * MIB,
            trailer_len: 16,
            session_cap_bytes: 200 * MIB + 16,
            quota_target_units: 1025,
            quota_unit_bytes: MIB,
            quota_step_units: 200,
            throttle: Duration::from_millis(3000),
            request_timeout: Duration::from_secs(30),
            transfer_idle_timeout: Duration::from_secs(60),
            transfer_timeout: None,
            parent_location: DEFAULT_PARENT_LOCATION.to_string(),
            extension: ".mp4".to_string(),
            name_prefix: "cy-".to_string(),
            manual_rename: 2,
            registration_endpoint: DEFAULT_REGISTRATION_ENDPOINT.to_string(),
            identity: ClientIdentity::default(),
            streaming_supported: true,
        }
    }
}

/// Fixed client markers sent with every request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub upload_src: String,
    pub channel_src: String,
    pub user_agent: String,
}

impl Default for ClientIdentity {
    fn default() -> Self {
        Self {
            upload_src: "1".to_string(),
            channel_src: "10000023".to_string(),
            user_agent: "okhttp/3.11.0".to_string(),
        }
    }
}

impl UploadConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Layer recognised `upload.*` keys from a config snapshot over the defaults.
    pub fn from_snapshot(snapshot: &CyConfigSnapshot) -> UploadResult<Self> {
        let mut config = Self::default();

        if let Some(v) = snapshot.get_usize("upload.chunk_size") {
            config.chunk_size = v;
        }
        if let Some(v) = snapshot.get_u64("upload.zero_prefix_bytes") {
            config.zero_prefix_bytes = v;
        }
        if let Some(v) = snapshot.get_usize("upload.trailer_len") {
            config.trailer_len = v;
        }
        if let Some(v) = snapshot.get_u64("upload.session_cap_bytes") {
            config.session_cap_bytes = v;
        }
        if let Some(v) = snapshot.get_u64("upload.quota_target_units") {
            config.quota_target_units = v;
        }
        if let Some(v) = snapshot.get_u64("upload.quota_unit_bytes") {
            config.quota_unit_bytes = v;
        }
        if let Some(v) = snapshot.get_u64("upload.quota_step_units") {
            config.quota_step_units = v;
        }
        if let Some(v) = snapshot.get_u64("upload.throttle_ms") {
            config.throttle = Duration::from_millis(v);
        }
        if let Some(v) = snapshot.get_u64("upload.request_timeout_secs") {
            config.request_timeout = Duration::from_secs(v);
        }
        if let Some(v) = snapshot.get_u64("upload.transfer_idle_timeout_secs") {
            config.transfer_idle_timeout = Duration::from_secs(v);
        }
        if let Some(v) = snapshot.get_u64("upload.transfer_timeout_secs") {
            config.transfer_timeout = Some(Duration::from_secs(v));
        }
        if let Some(v) = snapshot.get_string("upload.parent_location") {
            config.parent_location = v;
        }
        if let Some(v) = snapshot.get_string("upload.extension") {
            config.extension = v;
        }
        if let Some(v) = snapshot.get_string("upload.name_prefix") {
            config.name_prefix = v;
        }
        if let Some(v) = snapshot.get_string("upload.endpoint") {
            config.registration_endpoint = v;
        }
        if let Some(v) = snapshot.get_bool("upload.streaming_supported") {
            config.streaming_supported = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Size declared by every freshly synthesized payload.
    pub fn synthetic_size(&self) -> u64 {
        self.zero_prefix_bytes + self.trailer_len as u64
    }

    /// Reject settings that would break the session invariants.
    pub fn validate(&self) -> UploadResult<()> {
        if self.chunk_size == 0 {
            return Err(UploadError::InvalidChunkSize);
        }
        if self.synthetic_size() > self.session_cap_bytes {
            return Err(UploadError::invalid_config(format!(
                "Synthetic payload of {} bytes exceeds session cap {}",
                self.synthetic_size(),
                self.session_cap_bytes
            )));
        }
        if self.quota_unit_bytes == 0 || self.quota_step_units == 0 {
            return Err(UploadError::invalid_config(
                "Quota unit and step must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Set chunk size
    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes;
        self
    }

    /// Set the synthetic payload shape; the cap follows unless set afterwards
    pub fn with_payload(mut self, zero_prefix_bytes: u64, trailer_len: usize) -> Self {
        self.zero_prefix_bytes = zero_prefix_bytes;
        self.trailer_len = trailer_len;
        self.session_cap_bytes = self.synthetic_size();
        self
    }

    pub fn with_session_cap(mut self, bytes: u64) -> Self {
        self.session_cap_bytes = bytes;
        self
    }

    pub fn with_quota(mut self, target_units: u64, unit_bytes: u64, step_units: u64) -> Self {
        self.quota_target_units = target_units;
        self.quota_unit_bytes = unit_bytes;
        self.quota_step_units = step_units;
        self
    }

    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_transfer_idle_timeout(mut self, timeout: Duration) -> Self {
        self.transfer_idle_timeout = timeout;
        self
    }

    pub fn with_transfer_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.transfer_timeout = timeout;
        self
    }

    pub fn with_parent_location<S: Into<String>>(mut self, location: S) -> Self {
        self.parent_location = location.into();
        self
    }

    pub fn with_extension<S: Into<String>>(mut self, extension: S) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn with_registration_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.registration_endpoint = endpoint.into();
        self
    }

    pub fn with_streaming_supported(mut self, supported: bool) -> Self {
        self.streaming_supported = supported;
        self
    }
}
