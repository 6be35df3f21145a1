//! Quota-driven scheduling of synthetic upload sessions.
//!
//! A run computes how many quota units are still missing, then performs
//! one session per step: register a synthetic payload, stream it if the
//! service asks for it, and record what was created. Sessions run strictly
//! one after the other with a fixed pause in between.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cy_core::RunContext;
use tracing::{debug, error, info, instrument, warn};

use crate::payload::{creation_timestamp, display_name, random_hex};
use crate::{
    ContentId, ContentLedger, ContentRegistrar, Fingerprint, PlanReport, QuotaPlan,
    SessionOutcome, SessionReport, SyntheticPayload, UploadConfig, UploadDescriptor, UploadError,
    UploadResult, UploadTransport,
};

/// Cooperative delay between sessions
#[async_trait]
pub trait Throttle: Send + Sync {
    async fn pause(&self, duration: Duration);
}

/// [`Throttle`] backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioThrottle;

#[async_trait]
impl Throttle for TokioThrottle {
    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Quota units still missing after `progress_bytes` have been credited.
///
/// `target - floor(progress / unit)`, saturating at zero.
pub fn needed_units(progress_bytes: u64, config: &UploadConfig) -> u64 {
    config
        .quota_target_units
        .saturating_sub(progress_bytes / config.quota_unit_bytes.max(1))
}

/// Runs upload sessions until the missing quota is covered
#[derive(Clone)]
pub struct QuotaPlanner {
    registrar: ContentRegistrar,
    transport: Arc<dyn UploadTransport>,
    throttle: Arc<dyn Throttle>,
    config: UploadConfig,
}

impl QuotaPlanner {
    pub fn new<T: UploadTransport + 'static>(
        registrar: ContentRegistrar,
        transport: T,
        config: UploadConfig,
    ) -> UploadResult<Self> {
        Self::from_parts(registrar, Arc::new(transport), config)
    }

    pub fn from_parts(
        registrar: ContentRegistrar,
        transport: Arc<dyn UploadTransport>,
        config: UploadConfig,
    ) -> UploadResult<Self> {
        config.validate()?;
        Ok(Self {
            registrar,
            transport,
            throttle: Arc::new(TokioThrottle),
            config,
        })
    }

    pub fn with_throttle<H: Throttle + 'static>(mut self, throttle: H) -> Self {
        self.throttle = Arc::new(throttle);
        self
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Fresh plan for the given progress, nothing pinned yet
    pub fn plan(&self, progress_bytes: u64) -> QuotaPlan {
        QuotaPlan::new(
            needed_units(progress_bytes, &self.config),
            self.config.quota_unit_bytes,
            self.config.quota_step_units,
            self.config.session_cap_bytes,
        )
    }

    /// Run every session the plan calls for.
    ///
    /// Registration and transfer failures only fail their own session; the
    /// run always completes its iteration count. A payload that cannot be
    /// streamed at its declared size aborts the run.
    #[instrument(skip(self, ctx), fields(run_id = %ctx.run_id, account = %ctx.account))]
    pub async fn run(&self, ctx: &RunContext, progress_bytes: u64) -> UploadResult<PlanReport> {
        let mut plan = self.plan(progress_bytes);

        if !self.config.streaming_supported {
            debug!("Streaming uploads unsupported, skipping quota run");
            return Ok(PlanReport {
                plan,
                sessions: Vec::new(),
            });
        }

        info!(
            needed_units = plan.needed_units,
            sessions = plan.sessions_required,
            "Starting quota run"
        );

        let ledger = ContentLedger::new(&ctx.store);
        let mut sessions = Vec::new();
        let mut counter = 0u64;
        let mut index = 0u64;

        while counter < plan.needed_units {
            let payload = match plan.carried() {
                Some(identity) => SyntheticPayload::from_identity(identity),
                None => SyntheticPayload::generate(&self.config),
            };
            if payload.declared_size > plan.session_cap_bytes {
                return Err(UploadError::invalid_config(format!(
                    "payload of {} bytes exceeds the session cap of {}",
                    payload.declared_size, plan.session_cap_bytes
                )));
            }

            let descriptor = self.describe(&payload);
            let outcome = self.run_session(ctx, &descriptor, &payload).await?;

            match &outcome {
                SessionOutcome::Failed { reason } => {
                    error!(session = index, reason = %reason, "Upload session failed");
                }
                _ => {
                    if let Some(content_id) = outcome.content_id() {
                        ledger.record(content_id);
                    }
                    if plan.pin(payload.identity()) {
                        debug!(fingerprint = %payload.fingerprint, "Pinned upload identity");
                    }
                    info!(session = index, content_id = ?outcome.content_id(), "Upload session succeeded");
                }
            }

            sessions.push(SessionReport {
                index,
                fingerprint: payload.fingerprint.clone(),
                declared_size: payload.declared_size,
                outcome,
            });

            counter += self.config.quota_step_units;
            index += 1;

            if counter < plan.needed_units {
                self.throttle.pause(self.config.throttle).await;
            }
        }

        let report = PlanReport { plan, sessions };
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Quota run finished"
        );
        Ok(report)
    }

    /// Register and, when asked to, transfer one payload.
    async fn run_session(
        &self,
        ctx: &RunContext,
        descriptor: &UploadDescriptor,
        payload: &SyntheticPayload,
    ) -> UploadResult<SessionOutcome> {
        let registration = match self.registrar.register(ctx, descriptor).await {
            Ok(registration) => registration,
            Err(e) if e.is_session_scoped() => {
                return Ok(SessionOutcome::Failed {
                    reason: e.to_string(),
                })
            }
            Err(e) => return Err(e),
        };

        let Some((target, session)) = registration.transfer_target() else {
            return Ok(match registration.content_id.clone() {
                Some(content_id) => SessionOutcome::Registered { content_id },
                None => SessionOutcome::Failed {
                    reason: "Registration returned no content id".to_string(),
                },
            });
        };

        let stream = payload.stream(self.config.chunk_size)?;
        debug!(session = %session, target = %target, "Streaming payload");

        match self
            .transport
            .transmit(target, session, stream, descriptor.declared_size)
            .await
        {
            Ok(outcome) if outcome.success => Ok(SessionOutcome::Transferred {
                content_id: outcome.content_id.or_else(|| registration.content_id.clone()),
            }),
            Ok(_) => Ok(SessionOutcome::Failed {
                reason: "Upload endpoint rejected the transfer".to_string(),
            }),
            Err(e) if e.is_session_scoped() => {
                warn!(error = %e, "Transfer did not complete");
                Ok(SessionOutcome::Failed {
                    reason: e.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }

    fn describe(&self, payload: &SyntheticPayload) -> UploadDescriptor {
        UploadDescriptor {
            fingerprint: payload.fingerprint.clone(),
            declared_size: payload.declared_size,
            extension: self.config.extension.clone(),
            display_name: display_name(&self.config.name_prefix, &self.config.extension),
            parent_location: self.config.parent_location.clone(),
            created_at: creation_timestamp(),
            manual_rename: self.config.manual_rename,
        }
    }

    /// Register one empty file and record it.
    ///
    /// Empty content never needs a transfer, so an answer without a content
    /// id is a failure.
    #[instrument(skip(self, ctx), fields(run_id = %ctx.run_id))]
    pub async fn upload_placeholder(&self, ctx: &RunContext) -> UploadResult<ContentId> {
        let descriptor = UploadDescriptor {
            fingerprint: Fingerprint::empty(),
            declared_size: 0,
            extension: ".png".to_string(),
            display_name: format!("{}.png", random_hex(8)),
            parent_location: self.config.parent_location.clone(),
            created_at: creation_timestamp(),
            manual_rename: self.config.manual_rename,
        };

        let registration = self.registrar.register(ctx, &descriptor).await?;
        let content_id = registration
            .content_id
            .ok_or_else(|| UploadError::registration("Placeholder registration returned no content id"))?;

        ContentLedger::new(&ctx.store).record(&content_id);
        info!(content_id = %content_id, "Placeholder uploaded");
        Ok(content_id)
    }
}
