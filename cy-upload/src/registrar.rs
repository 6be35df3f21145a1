use std::sync::Arc;

use async_trait::async_trait;
use cy_core::RunContext;
use reqwest::Url;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::{
    xml, ContentId, RegistrationResult, UploadDescriptor, UploadError, UploadResult,
    UploadSessionId,
};

/// Remote call that declares a content object.
///
/// Implementations return the raw response body, XML or JSON; interpreting
/// it is left to [`ContentRegistrar`].
#[async_trait]
pub trait RegistrationApi: Send + Sync {
    async fn register_content(
        &self,
        ctx: &RunContext,
        descriptor: &UploadDescriptor,
    ) -> UploadResult<String>;
}

/// Declares content objects and interprets what the service answers
#[derive(Clone)]
pub struct ContentRegistrar {
    api: Arc<dyn RegistrationApi>,
}

impl ContentRegistrar {
    pub fn new<A: RegistrationApi + 'static>(api: A) -> Self {
        Self { api: Arc::new(api) }
    }

    pub fn from_arc(api: Arc<dyn RegistrationApi>) -> Self {
        Self { api }
    }

    /// Register a descriptor.
    ///
    /// Every failure, whether from the call or from the answer, surfaces
    /// as [`UploadError::Registration`].
    #[instrument(skip(self, ctx, descriptor), fields(run_id = %ctx.run_id, fingerprint = %descriptor.fingerprint))]
    pub async fn register(
        &self,
        ctx: &RunContext,
        descriptor: &UploadDescriptor,
    ) -> UploadResult<RegistrationResult> {
        let raw = self
            .api
            .register_content(ctx, descriptor)
            .await
            .map_err(|e| match e {
                UploadError::Registration { .. } => e,
                other => UploadError::registration(other.to_string()),
            })?;

        let result = parse_registration(&raw)?;
        debug!(
            content_id = ?result.content_id,
            transfer = result.requires_transfer(),
            "Registration answered"
        );
        Ok(result)
    }
}

/// Interpret a registration answer, XML or JSON.
pub fn parse_registration(raw: &str) -> UploadResult<RegistrationResult> {
    let trimmed = raw.trim_start();
    let (content_id, redirect, session) = if trimmed.starts_with('{') {
        parse_json(trimmed)?
    } else {
        parse_xml(trimmed)?
    };

    let redirect_target = match redirect.filter(|u| !u.trim().is_empty()) {
        Some(raw_url) => Some(Url::parse(raw_url.trim()).map_err(|e| {
            UploadError::registration(format!("Invalid redirect target '{}': {}", raw_url, e))
        })?),
        None => None,
    };

    let result = RegistrationResult {
        content_id: content_id.and_then(ContentId::parse),
        redirect_target,
        session_id: session
            .filter(|s| !s.trim().is_empty())
            .map(|s| UploadSessionId::from_string(s.trim().to_string())),
    };

    if result.content_id.is_none() && !result.requires_transfer() {
        return Err(UploadError::registration(
            "Response carried neither a content id nor a transfer target",
        ));
    }
    Ok(result)
}

type Fields = (Option<String>, Option<String>, Option<String>);

fn parse_xml(raw: &str) -> UploadResult<Fields> {
    let fields = xml::scan(raw)
        .map_err(|e| UploadError::registration(format!("Unreadable XML response: {}", e)))?;

    if let Some(code) = fields.result_code.as_deref() {
        if code != "0" {
            let desc = fields.get("desc").unwrap_or("no description");
            return Err(UploadError::registration(format!(
                "Refused with resultCode {}: {}",
                code, desc
            )));
        }
    }

    Ok((
        fields.get("contentID").map(str::to_string),
        fields.get("redirectionUrl").map(str::to_string),
        fields.get("uploadTaskID").map(str::to_string),
    ))
}

fn parse_json(raw: &str) -> UploadResult<Fields> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| UploadError::registration(format!("Unreadable JSON response: {}", e)))?;

    if value.get("success").and_then(Value::as_bool) == Some(false) {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("no message");
        return Err(UploadError::registration(format!("Refused: {}", message)));
    }

    let upload = &value["data"]["uploadResult"];
    let text = |v: &Value| v.as_str().map(str::to_string);

    let content_id = text(&upload["newContentIDList"][0]["contentID"])
        .or_else(|| text(&value["data"]["contentID"]));

    Ok((
        content_id,
        text(&upload["redirectionUrl"]),
        text(&upload["uploadTaskID"]),
    ))
}
