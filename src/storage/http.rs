//! Path-style client for S3/OBS compatible object storage.
//!
//! Requests are signed with SigV4 when an access key pair is configured and sent
//! anonymously otherwise.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Method, StatusCode};
use url::Url;

use super::ObjectStore;
use super::sigv4::{self, CONTENT_SHA256_HEADER, DATE_HEADER, Signer};
use crate::config::ObjectStoreConfig;
use crate::error::SyncError;

const COPY_SOURCE_HEADER: &str = "x-amz-copy-source";

/// Object store reached over HTTP at `{endpoint}/{bucket}/{key}`.
#[derive(Debug, Clone)]
pub struct HttpObjectStore {
    client: reqwest::Client,
    endpoint: Url,
    bucket: String,
    signer: Option<Signer>,
}

impl HttpObjectStore {
    pub fn new(endpoint: &str, bucket: impl Into<String>, signer: Option<Signer>) -> Result<Self, SyncError> {
        let endpoint = Url::parse(endpoint).map_err(|err| {
            SyncError::ObjectStoreFailure(format!("invalid object store endpoint {endpoint:?}: {err}"))
        })?;

        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            bucket: bucket.into(),
            signer,
        })
    }

    pub fn from_config(config: &ObjectStoreConfig) -> Result<Self, SyncError> {
        let signer = match (&config.access_key, &config.secret_key) {
            (Some(access_key), Some(secret_key)) => {
                Some(Signer::new(access_key, secret_key, &config.region))
            }
            _ => None,
        };
        Self::new(&config.endpoint, config.bucket.clone(), signer)
    }

    /// `{endpoint}/{bucket}/{key}` with every segment encoded the way the signature expects.
    fn object_url(&self, key: &str) -> Result<Url, SyncError> {
        if self.endpoint.cannot_be_a_base() {
            return Err(SyncError::ObjectStoreFailure(format!(
                "object store endpoint {} can't carry a path",
                self.endpoint
            )));
        }

        let mut path = self.endpoint.path().trim_end_matches('/').to_string();
        path.push('/');
        path.push_str(&object_path(&self.bucket, key));

        let mut url = self.endpoint.clone();
        url.set_path(&path);
        Ok(url)
    }

    /// Build a request, signing it over `extra_headers` and `body`.
    fn request(
        &self,
        method: Method,
        url: Url,
        extra_headers: Vec<(&'static str, String)>,
        body: Vec<u8>,
    ) -> Result<reqwest::RequestBuilder, SyncError> {
        let mut headers = extra_headers;
        if let Some(signer) = &self.signer {
            let now = Utc::now();
            let payload_hash = sigv4::payload_hash(&body);
            headers.push((DATE_HEADER, sigv4::amz_date(now)));
            headers.push((CONTENT_SHA256_HEADER, payload_hash.clone()));
            let authorization =
                signer.authorization(method.as_str(), &url, &headers, &payload_hash, now)?;
            headers.push(("authorization", authorization));
        }

        let mut builder = self.client.request(method, url);
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        Ok(builder.body(body))
    }

    async fn failure(operation: &str, key: &str, response: reqwest::Response) -> SyncError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        SyncError::ObjectStoreFailure(format!("{operation} {key} returned {status}: {body}"))
    }
}

/// `{bucket}/{key}` with empty key segments dropped.
fn object_path(bucket: &str, key: &str) -> String {
    std::iter::once(bucket)
        .chain(key.split('/').filter(|segment| !segment.is_empty()))
        .map(sigv4::uri_encode)
        .collect::<Vec<_>>()
        .join("/")
}

fn transport_error(operation: &str, key: &str, err: reqwest::Error) -> SyncError {
    SyncError::ObjectStoreFailure(format!("{operation} {key} failed: {err}"))
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>, SyncError> {
        let url = self.object_url(key)?;
        let response = self
            .request(Method::GET, url, Vec::new(), Vec::new())?
            .send()
            .await
            .map_err(|err| transport_error("get", key, err))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::failure("get", key, response).await);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| transport_error("get", key, err))?;
        Ok(Some(bytes.to_vec()))
    }

    async fn put_object(&self, key: &str, content: Vec<u8>) -> Result<(), SyncError> {
        let url = self.object_url(key)?;
        let response = self
            .request(Method::PUT, url, Vec::new(), content)?
            .send()
            .await
            .map_err(|err| transport_error("put", key, err))?;

        if !response.status().is_success() {
            return Err(Self::failure("put", key, response).await);
        }
        Ok(())
    }

    async fn copy_object(&self, dst: &str, src: &str) -> Result<(), SyncError> {
        let url = self.object_url(dst)?;
        let copy_source = format!("/{}", object_path(&self.bucket, src));
        let response = self
            .request(Method::PUT, url, vec![(COPY_SOURCE_HEADER, copy_source)], Vec::new())?
            .send()
            .await
            .map_err(|err| transport_error("copy", dst, err))?;

        if !response.status().is_success() {
            return Err(Self::failure("copy", dst, response).await);
        }
        Ok(())
    }
}
