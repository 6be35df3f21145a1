//! # cy-upload: synthetic bulk uploads for cloud-storage quota tasks
//!
//! `cy-upload` declares and streams large synthetic files to a remote
//! storage service until a quota target is met. A payload is a recipe
//! (zero bytes plus a short random trailer) and is produced lazily, so a
//! 200 MiB upload never holds more than one chunk in memory.
//!
//! ## Pipeline
//!
//! ```text
//! QuotaPlanner
//!   └─ per session ─┬─ ContentRegistrar   declare the object
//!                   ├─ UploadTransport    stream the bytes, if asked to
//!                   └─ ContentLedger      remember what was created
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cy_upload::prelude::*;
//! use cy_core::RunContext;
//!
//! # #[tokio::main]
//! # async fn main() -> UploadResult<()> {
//! let config = UploadConfig::default();
//! let api = HttpRegistrationApi::new(&config)?
//!     .with_header("Authorization", "Basic ...")?;
//! let transport = HttpUploadTransport::new(&config)?;
//! let planner = QuotaPlanner::new(ContentRegistrar::new(api), transport, config)?;
//!
//! let ctx = RunContext::new("13800000000");
//! let report = planner.run(&ctx, 425 * 1024 * 1024).await?;
//! println!("{} sessions succeeded", report.succeeded());
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod http_registrar;
mod ledger;
pub mod payload;
mod planner;
mod registrar;
mod stream;
mod transport;
mod types;
pub mod xml;

pub use config::{
    ClientIdentity, UploadConfig, DEFAULT_PARENT_LOCATION, DEFAULT_REGISTRATION_ENDPOINT,
};
pub use error::{UploadError, UploadResult};
pub use http_registrar::{request_body, HttpRegistrationApi};
pub use ledger::ContentLedger;
pub use payload::SyntheticPayload;
pub use planner::{needed_units, QuotaPlanner, Throttle, TokioThrottle};
pub use registrar::{parse_registration, ContentRegistrar, RegistrationApi};
pub use stream::PayloadStream;
pub use transport::{HttpUploadTransport, UploadTransport};
pub use types::{
    ContentId, Fingerprint, PinnedIdentity, PlanReport, QuotaPlan, RegistrationResult,
    SessionOutcome, SessionReport, TransferOutcome, UploadDescriptor, UploadSessionId,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        ContentId, ContentLedger, ContentRegistrar, HttpRegistrationApi, HttpUploadTransport,
        PayloadStream, PlanReport, QuotaPlanner, RegistrationApi, SessionOutcome, UploadConfig,
        UploadError, UploadResult, UploadTransport,
    };
}
