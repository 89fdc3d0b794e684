use crate::actors::messages::AppError;
use crate::actors::traits::MediaFetcher;
use crate::models::ImagePayload;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, instrument, warn};
use url::Url;

/// Hosts the gateway serves media from when none are configured.
pub const DEFAULT_MEDIA_AUTH_HOSTS: &[&str] = &["api.twilio.com", "*.twilio.com"];

/// Basic-auth credentials for the messaging gateway's media endpoint.
#[derive(Debug, Clone)]
pub struct MediaCredentials {
    pub username: String,
    pub password: String,
    /// Hosts the credentials may be sent to: exact names, or `*.domain` for any subdomain.
    pub hosts: Vec<String>,
}

impl MediaCredentials {
    /// True when `host` is one of the gateway hosts these credentials belong to.
    pub fn allows(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        self.hosts.iter().any(|pattern| {
            let pattern = pattern.trim().to_ascii_lowercase();
            match pattern.strip_prefix("*.") {
                Some(domain) => host
                    .strip_suffix(domain)
                    .is_some_and(|prefix| prefix.len() > 1 && prefix.ends_with('.')),
                None => host == pattern,
            }
        })
    }
}

/// Downloads inbound attachments over HTTP(S).
pub struct HttpMediaFetcher {
    client: Client,
    credentials: Option<MediaCredentials>,
    timeout: Duration,
    max_bytes: usize,
}

impl HttpMediaFetcher {
    pub fn new(credentials: Option<MediaCredentials>, timeout: Duration, max_bytes: usize) -> Self {
        Self {
            client: Client::new(),
            credentials,
            timeout,
            max_bytes,
        }
    }

    async fn download(&self, url: Url) -> Result<(Vec<u8>, Option<String>), AppError> {
        let host = url.host_str().unwrap_or_default().to_string();
        let mut request = self.client.get(url);
        match &self.credentials {
            Some(creds) if creds.allows(&host) => {
                request = request.basic_auth(&creds.username, Some(&creds.password));
            }
            Some(_) => warn!(host = %host, "Media host is not a gateway host; fetching without credentials"),
            None => {}
        }

        let mut res = request
            .send()
            .await
            .map_err(|e| AppError::MediaFetch(format!("request failed: {}", e)))?;

        let status = res.status();
        if !status.is_success() {
            return Err(AppError::MediaFetch(format!("media server answered {}", status)));
        }

        if let Some(len) = res.content_length() {
            if len as usize > self.max_bytes {
                return Err(self.too_large(len as usize));
            }
        }

        let header_type = res
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        // Content-Length may be absent or wrong; the cap is enforced while reading.
        let mut bytes = Vec::new();
        while let Some(chunk) = res
            .chunk()
            .await
            .map_err(|e| AppError::MediaFetch(format!("reading body failed: {}", e)))?
        {
            if bytes.len() + chunk.len() > self.max_bytes {
                return Err(self.too_large(bytes.len() + chunk.len()));
            }
            bytes.extend_from_slice(&chunk);
        }

        if bytes.is_empty() {
            return Err(AppError::MediaFetch("attachment is empty".to_string()));
        }

        Ok((bytes, header_type))
    }

    fn too_large(&self, len: usize) -> AppError {
        AppError::MediaFetch(format!(
            "attachment is at least {} bytes, limit is {}",
            len, self.max_bytes
        ))
    }
}

/// Picks the content type to trust: sniffed bytes first, then the server, then the gateway.
fn resolve_content_type(bytes: &[u8], header_type: Option<&str>, declared: Option<&str>) -> Option<String> {
    if let Some(kind) = infer::get(bytes) {
        return Some(kind.mime_type().to_string());
    }
    header_type
        .or(declared)
        .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase())
        .filter(|ct| !ct.is_empty())
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    #[instrument(skip(self, url), fields(declared_type = ?declared_type))]
    async fn fetch(&self, url: &str, declared_type: Option<&str>) -> Result<ImagePayload, AppError> {
        let parsed = Url::parse(url).map_err(|e| AppError::MediaFetch(format!("bad media URL: {}", e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppError::MediaFetch(format!("unsupported scheme {}", parsed.scheme())));
        }

        let (bytes, header_type) = match timeout(self.timeout, self.download(parsed)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "Media download timed out");
                return Err(AppError::MediaFetch("download timed out".to_string()));
            }
        };

        let content_type = resolve_content_type(&bytes, header_type.as_deref(), declared_type)
            .ok_or_else(|| AppError::UnsupportedMedia("unknown".to_string()))?;
        if !content_type.starts_with("image/") {
            return Err(AppError::UnsupportedMedia(content_type));
        }

        info!(bytes = bytes.len(), content_type = %content_type, "Media downloaded");
        Ok(ImagePayload { bytes, content_type })
    }
}
