use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, RANGE};
use reqwest::{Body, Url};
use tracing::{debug, instrument, warn};

use crate::{
    xml, ClientIdentity, ContentId, PayloadStream, TransferOutcome, UploadConfig, UploadError,
    UploadResult, UploadSessionId,
};

/// Streams a payload to a redirect target handed out by registration.
///
/// The payload is consumed exactly once. A non-2xx answer is a normal
/// outcome (`success == false`); an error means the request never
/// completed.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    async fn transmit(
        &self,
        target: &Url,
        session: &UploadSessionId,
        payload: PayloadStream,
        declared_size: u64,
    ) -> UploadResult<TransferOutcome>;
}

/// HTTP implementation posting the payload as a streamed body
#[derive(Debug, Clone)]
pub struct HttpUploadTransport {
    client: reqwest::Client,
    identity: ClientIdentity,
}

impl HttpUploadTransport {
    pub fn new(config: &UploadConfig) -> UploadResult<Self> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(config.request_timeout)
            .read_timeout(config.transfer_idle_timeout)
            .user_agent(config.identity.user_agent.as_str());
        if let Some(total) = config.transfer_timeout {
            builder = builder.timeout(total);
        }
        let client = builder.build().map_err(UploadError::backend)?;

        Ok(Self::with_client(client, config.identity.clone()))
    }

    pub fn with_client(client: reqwest::Client, identity: ClientIdentity) -> Self {
        Self { client, identity }
    }
}

#[async_trait]
impl UploadTransport for HttpUploadTransport {
    #[instrument(skip(self, target, payload))]
    async fn transmit(
        &self,
        target: &Url,
        session: &UploadSessionId,
        payload: PayloadStream,
        declared_size: u64,
    ) -> UploadResult<TransferOutcome> {
        if payload.emitted() > 0 || payload.remaining() != declared_size {
            return Err(UploadError::malformed(format!(
                "stream has {} of {} bytes left but {} were declared",
                payload.remaining(),
                payload.total_size(),
                declared_size
            )));
        }

        let range = format!("bytes=0-{}", declared_size.saturating_sub(1));

        let response = self
            .client
            .post(target.clone())
            .header("UploadtaskID", session.header_value())
            .header("x-huawei-uploadSrc", self.identity.upload_src.as_str())
            .header("x-huawei-channelSrc", self.identity.channel_src.as_str())
            .header(CONTENT_TYPE, "application/octet-stream")
            .header("contentSize", declared_size.to_string())
            .header(RANGE, range)
            .body(Body::wrap_stream(payload))
            .send()
            .await
            .map_err(|e| UploadError::transfer(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "Upload endpoint rejected the transfer");
            return Ok(TransferOutcome::rejected());
        }

        // The body is informational; an unreadable one does not undo the upload.
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                debug!(error = %e, "Transfer response body unreadable");
                String::new()
            }
        };
        let content_id = content_id_in(&body);
        debug!(content_id = ?content_id, "Transfer accepted");

        Ok(TransferOutcome::succeeded(content_id))
    }
}

fn content_id_in(body: &str) -> Option<ContentId> {
    if body.trim().is_empty() {
        return None;
    }
    xml::scan(body)
        .ok()
        .and_then(|fields| fields.get("contentID").and_then(ContentId::parse))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use mockito::Matcher;

    fn session() -> UploadSessionId {
        UploadSessionId::from_string("task-9".to_string())
    }

    fn payload() -> PayloadStream {
        PayloadStream::new(20, Bytes::from_static(b"TAIL"), 8).unwrap()
    }

    #[tokio::test]
    async fn test_streams_body_with_transfer_headers() {
        let mut server = mockito::Server::new_async().await;
        let mut expected = vec![0u8; 16];
        expected.extend_from_slice(b"TAIL");

        let mock = server
            .mock("POST", "/upload")
            .match_header("uploadtaskid", "task-9-")
            .match_header("x-huawei-uploadsrc", "1")
            .match_header("x-huawei-channelsrc", "10000023")
            .match_header("content-type", "application/octet-stream")
            .match_header("contentsize", "20")
            .match_header("range", "bytes=0-19")
            .match_header("user-agent", "okhttp/3.11.0")
            .match_body(Matcher::Exact(String::from_utf8(expected).unwrap()))
            .with_status(200)
            .with_body("<result><contentID>t-1</contentID></result>")
            .create_async()
            .await;

        let transport = HttpUploadTransport::new(&UploadConfig::default()).unwrap();
        let target = Url::parse(&format!("{}/upload", server.url())).unwrap();

        let outcome = transport
            .transmit(&target, &session(), payload(), 20)
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.content_id.unwrap().as_str(), "t-1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_body_still_succeeds() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/upload")
            .with_status(200)
            .create_async()
            .await;

        let transport = HttpUploadTransport::new(&UploadConfig::default()).unwrap();
        let target = Url::parse(&format!("{}/upload", server.url())).unwrap();

        let outcome = transport
            .transmit(&target, &session(), payload(), 20)
            .await
            .unwrap();
        assert_eq!(outcome, TransferOutcome::succeeded(None));
    }

    #[tokio::test]
    async fn test_broken_response_body_still_succeeds() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/upload")
            .with_status(200)
            .with_chunked_body(|w| {
                std::io::Write::write_all(w, b"<result><contentID>")?;
                Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "cut"))
            })
            .create_async()
            .await;

        let transport = HttpUploadTransport::new(&UploadConfig::default()).unwrap();
        let target = Url::parse(&format!("{}/upload", server.url())).unwrap();

        let outcome = transport
            .transmit(&target, &session(), payload(), 20)
            .await
            .unwrap();
        assert!(outcome.success);
    }

    #[tokio::test]
    async fn test_error_status_is_not_success() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/upload")
            .with_status(500)
            .create_async()
            .await;

        let transport = HttpUploadTransport::new(&UploadConfig::default()).unwrap();
        let target = Url::parse(&format!("{}/upload", server.url())).unwrap();

        let outcome = transport
            .transmit(&target, &session(), payload(), 20)
            .await
            .unwrap();
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn test_unreachable_target_is_transfer_error() {
        let transport = HttpUploadTransport::new(&UploadConfig::default()).unwrap();
        let target = Url::parse("http://127.0.0.1:1/upload").unwrap();

        let err = transport
            .transmit(&target, &session(), payload(), 20)
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Transfer { .. }));
    }

    #[tokio::test]
    async fn test_partly_drained_stream_is_rejected_locally() {
        let mut server = mockito::Server::new_async().await;
        let upload = server
            .mock("POST", "/upload")
            .with_status(200)
            .expect(0)
            .create_async()
            .await;

        let transport = HttpUploadTransport::new(&UploadConfig::default()).unwrap();
        let target = Url::parse(&format!("{}/upload", server.url())).unwrap();

        let mut stream = payload();
        assert!(stream.next_chunk().is_some());

        let err = transport
            .transmit(&target, &session(), stream, 20)
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::MalformedStream { .. }));
        upload.assert_async().await;
    }

    #[tokio::test]
    async fn test_declared_size_mismatch_is_rejected_locally() {
        let transport = HttpUploadTransport::new(&UploadConfig::default()).unwrap();
        let target = Url::parse("http://127.0.0.1:1/upload").unwrap();

        let err = transport
            .transmit(&target, &session(), payload(), 21)
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::MalformedStream { .. }));
    }
}
