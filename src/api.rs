// API client module: a small blocking HTTP client for the Reeltube
// control plane. It only knows how to shape requests and decode responses;
// the upload engine drives it through the `ControlPlane` trait.

use crate::config::Config;
use crate::upload::{ControlPlane, PartResult};
use anyhow::{Context, Result};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Holds a reqwest blocking client, the base URL of the API and the bearer
/// token sent with every call.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    token: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Profile {
    pub id: String,
    pub handle: String,
    pub bio: Option<String>,
    pub image_path: Option<String>,
    #[serde(default)]
    pub is_business: bool,
    #[serde(default)]
    pub is_verified: bool,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct MeResponse {
    pub profile: Profile,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MediaUpload {
    pub id: String,
}

#[derive(Serialize, Debug)]
pub struct CreateMediaUploadRequest<'a> {
    pub filename: &'a str,
    pub size: u64,
}

/// Control-plane answer to an upload registration: part layout plus one
/// presigned URL per part.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateMediaUploadResponse {
    pub upload_id: String,
    pub part_size: u64,
    pub num_parts: usize,
    #[serde(default)]
    pub presigned_urls: Vec<String>,
    pub media_upload: MediaUpload,
}

#[derive(Serialize, Debug)]
pub struct CompleteUploadRequest<'a> {
    #[serde(rename = "id")]
    pub media_upload_id: &'a str,
    pub upload_id: &'a str,
    pub parts: &'a [PartResult],
}

/// The control plane may answer completion with any JSON object.
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct CompleteUploadResponse {
    #[serde(default)]
    pub media_upload: Option<MediaUpload>,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("reeltube-cli/", env!("CARGO_PKG_VERSION")))
            .timeout(None)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(ApiClient {
            client,
            base_url: config.base_url.clone(),
            token: config.api_key.clone(),
        })
    }

    /// Append `path` to the base URL, keeping any path the base already has.
    fn url(&self, path: &str) -> Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Url::parse(&format!("{base}/{path}")).context("failed to build API URL")
    }

    fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
        let req = req.bearer_auth(&self.token).build().context("Failed to build request")?;
        tracing::debug!(method = %req.method(), url = %req.url(), "request");
        if let Some(body) = req.body().and_then(|b| b.as_bytes()) {
            tracing::debug!(body = %String::from_utf8_lossy(body), "request body");
        }

        let res = self.client.execute(req).context("Failed to send request")?;
        let status = res.status();
        tracing::debug!(%status, "response status");
        let txt = res.text().unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!("API error ({}): {}", status, txt);
        }
        tracing::debug!(body = %txt, "response body");
        serde_json::from_str(&txt).context("Parsing response json")
    }

    /// `GET /api/v0/me`: confirms the key and returns the caller's profile.
    pub fn me(&self) -> Result<MeResponse> {
        let url = self.url("/api/v0/me")?;
        self.send_json(self.client.get(url))
    }

    pub fn create_media_upload(&self, file_name: &str, file_size: u64) -> Result<CreateMediaUploadResponse> {
        let url = self.url("/api/v0/media_uploads")?;
        let body = CreateMediaUploadRequest {
            filename: file_name,
            size: file_size,
        };
        self.send_json(self.client.post(url).json(&body))
    }

    pub fn complete_multipart_upload(
        &self,
        media_upload_id: &str,
        upload_id: &str,
        parts: &[PartResult],
    ) -> Result<CompleteUploadResponse> {
        let url = self.url(&format!("/api/v0/media_uploads/{media_upload_id}/complete"))?;
        let body = CompleteUploadRequest {
            media_upload_id,
            upload_id,
            parts,
        };
        self.send_json(self.client.post(url).json(&body))
    }
}

impl ControlPlane for ApiClient {
    fn open_session(&self, file_name: &str, file_size: u64) -> Result<CreateMediaUploadResponse> {
        self.create_media_upload(file_name, file_size)
    }

    fn complete(&self, media_upload_id: &str, upload_id: &str, parts: &[PartResult]) -> Result<()> {
        self.complete_multipart_upload(media_upload_id, upload_id, parts)
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> ApiClient {
        let config = Config::resolve(Some("key"), base).unwrap();
        ApiClient::new(&config).unwrap()
    }

    #[test]
    fn url_keeps_base_path() {
        let c = client("https://example.com/prefix/");
        assert_eq!(
            c.url("/api/v0/me").unwrap().as_str(),
            "https://example.com/prefix/api/v0/me"
        );
        let c = client("https://example.com");
        assert_eq!(
            c.url("api/v0/media_uploads").unwrap().as_str(),
            "https://example.com/api/v0/media_uploads"
        );
    }

    #[test]
    fn completion_response_tolerates_missing_media_upload() {
        let resp: CompleteUploadResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.media_upload.is_none());
        let resp: CompleteUploadResponse =
            serde_json::from_str(r#"{"media_upload": {"id": "m1"}, "status": "done"}"#).unwrap();
        assert_eq!(resp.media_upload.unwrap().id, "m1");
    }

    #[test]
    fn complete_request_serializes_manifest() {
        let parts = vec![
            PartResult { part_number: 1, etag: "a".into() },
            PartResult { part_number: 2, etag: "b".into() },
        ];
        let body = CompleteUploadRequest {
            media_upload_id: "m1",
            upload_id: "u1",
            parts: &parts,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "id": "m1",
                "upload_id": "u1",
                "parts": [
                    {"part_number": 1, "etag": "a"},
                    {"part_number": 2, "etag": "b"}
                ]
            })
        );
    }
}
