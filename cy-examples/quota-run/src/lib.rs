use std::path::Path;

use anyhow::{Context, Result};
use cy_core::{CyConfig, RunContext, RunStore, StoreSnapshot};
use cy_upload::{
    ContentRegistrar, HttpRegistrationApi, HttpUploadTransport, QuotaPlanner, UploadConfig,
};
use tracing::{info, warn};

/// Environment variables read by the binary start with this prefix,
/// e.g. `CYFARM__ACCOUNT__PHONE` for `account.phone`.
pub const ENV_PREFIX: &str = "CYFARM__";

/// A configured quota run, ready to execute
pub struct QuotaRun {
    planner: QuotaPlanner,
    ctx: RunContext,
    progress_bytes: u64,
    placeholder: bool,
    store_path: Option<String>,
}

pub fn build(prefix: &str) -> Result<QuotaRun> {
    from_config(CyConfig::from_env(prefix))
}

/// Wire the pipeline from configuration.
///
/// Recognised keys besides `upload.*`: `account.phone` (required),
/// `account.authorization`, `run.progress_bytes`, `run.placeholder` and
/// `run.store_path`.
pub fn from_config(config: CyConfig) -> Result<QuotaRun> {
    let snapshot = config.snapshot();

    let account = snapshot.require("account.phone")?.to_string();
    let upload = UploadConfig::from_snapshot(&snapshot)?;

    let mut api = HttpRegistrationApi::new(&upload)?;
    if let Some(authorization) = snapshot.get("account.authorization") {
        api = api.with_header("Authorization", authorization)?;
    }
    let transport = HttpUploadTransport::new(&upload)?;
    let planner = QuotaPlanner::new(ContentRegistrar::new(api), transport, upload)?;

    let store_path = snapshot.get_string("run.store_path");
    let store = match store_path.as_deref() {
        Some(path) if Path::new(path).exists() => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading store from {path}"))?;
            RunStore::from_snapshot(StoreSnapshot::from_json(&raw)?)
        }
        _ => RunStore::new(),
    };

    let ctx = RunContext::new(account)
        .with_store(store)
        .with_config(snapshot.clone());

    Ok(QuotaRun {
        planner,
        ctx,
        progress_bytes: snapshot.get_u64("run.progress_bytes").unwrap_or(0),
        placeholder: snapshot.get_bool("run.placeholder").unwrap_or(false),
        store_path,
    })
}

impl QuotaRun {
    /// Run the optional placeholder upload, then the quota plan, and hand
    /// back the store for persistence.
    pub async fn execute(&self) -> Result<StoreSnapshot> {
        if self.placeholder {
            if let Err(e) = self.planner.upload_placeholder(&self.ctx).await {
                warn!(error = %e, "Placeholder upload failed");
            }
        }

        let report = self.planner.run(&self.ctx, self.progress_bytes).await?;
        info!(
            run_id = %self.ctx.run_id,
            sessions = report.sessions.len(),
            succeeded = report.succeeded(),
            "Quota run complete"
        );

        Ok(self.ctx.store.snapshot())
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    pub fn store_path(&self) -> Option<&str> {
        self.store_path.as_deref()
    }

    pub fn progress_bytes(&self) -> u64 {
        self.progress_bytes
    }
}
