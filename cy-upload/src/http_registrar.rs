use async_trait::async_trait;
use cy_core::RunContext;
use quick_xml::escape::escape;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use tracing::{debug, warn};

use crate::{ClientIdentity, RegistrationApi, UploadConfig, UploadDescriptor, UploadError, UploadResult};

/// [`RegistrationApi`] speaking the storage service's `pcUploadFileRequest`
/// XML dialect over HTTP.
///
/// Credentials are opaque: whatever headers the caller attaches through
/// [`HttpRegistrationApi::with_header`] are sent unchanged.
#[derive(Debug, Clone)]
pub struct HttpRegistrationApi {
    client: reqwest::Client,
    endpoint: String,
    identity: ClientIdentity,
    headers: HeaderMap,
}

impl HttpRegistrationApi {
    pub fn new(config: &UploadConfig) -> UploadResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.identity.user_agent.as_str())
            .build()
            .map_err(UploadError::backend)?;

        Ok(Self::with_client(client, config))
    }

    /// Use a pre-built client, e.g. one shared with other tasks
    pub fn with_client(client: reqwest::Client, config: &UploadConfig) -> Self {
        Self {
            client,
            endpoint: config.registration_endpoint.clone(),
            identity: config.identity.clone(),
            headers: HeaderMap::new(),
        }
    }

    pub fn with_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Attach a header to every registration call
    pub fn with_header(mut self, name: &str, value: &str) -> UploadResult<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| UploadError::invalid_config(format!("Invalid header name '{}': {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| UploadError::invalid_config(format!("Invalid value for header '{}': {}", name, e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RegistrationApi for HttpRegistrationApi {
    async fn register_content(
        &self,
        ctx: &RunContext,
        descriptor: &UploadDescriptor,
    ) -> UploadResult<String> {
        let body = request_body(ctx.account.as_str(), descriptor);

        let response = self
            .client
            .post(&self.endpoint)
            .headers(self.headers.clone())
            .header(CONTENT_TYPE, "text/xml;UTF-8")
            .header("x-huawei-channelSrc", self.identity.channel_src.as_str())
            .body(body)
            .send()
            .await
            .map_err(|e| UploadError::registration(format!("Registration call failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| UploadError::registration(format!("Unreadable registration response: {}", e)))?;

        if !status.is_success() {
            warn!(status = %status, "Registration endpoint answered with an error status");
            return Err(UploadError::registration(format!(
                "Registration endpoint answered {}",
                status
            )));
        }

        debug!(bytes = text.len(), "Registration response received");
        Ok(text)
    }
}

/// XML request declaring one content object
pub fn request_body(account: &str, descriptor: &UploadDescriptor) -> String {
    format!(
        "<pcUploadFileRequest>\
<ownerMSISDN>{account}</ownerMSISDN>\
<fileCount>1</fileCount>\
<totalSize>{size}</totalSize>\
<uploadContentList length=\"1\"><uploadContentInfo>\
<comlexFlag>0</comlexFlag>\
<contentDesc><![CDATA[]]></contentDesc>\
<contentName><![CDATA[{name}]]></contentName>\
<contentSize>{size}</contentSize>\
<contentTAGList></contentTAGList>\
<digest>{digest}</digest>\
<exif/>\
<fileEtag>0</fileEtag>\
<fileVersion>0</fileVersion>\
<updateContentID></updateContentID>\
<createTime>{created}</createTime>\
</uploadContentInfo></uploadContentList>\
<newCatalogName></newCatalogName>\
<parentCatalogID>{parent}</parentCatalogID>\
<operation>0</operation>\
<path></path>\
<manualRename>{rename}</manualRename>\
<autoCreatePath length=\"0\"/>\
<tagID></tagID>\
<tagType></tagType>\
</pcUploadFileRequest>",
        account = escape(account),
        size = descriptor.declared_size,
        name = descriptor.display_name.replace("]]>", "]]]]><![CDATA[>"),
        digest = escape(descriptor.fingerprint.as_str()),
        created = escape(&descriptor.created_at),
        parent = escape(&descriptor.parent_location),
        rename = descriptor.manual_rename,
    )
}
