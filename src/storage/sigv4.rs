//! AWS Signature Version 4 for S3/OBS compatible requests.
//!
//! Only what the object store client sends is covered: path-style URLs without a query
//! string, a handful of `x-amz-*` headers and a precomputed payload hash.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use url::Url;

use crate::error::SyncError;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";

pub const CONTENT_SHA256_HEADER: &str = "x-amz-content-sha256";
pub const DATE_HEADER: &str = "x-amz-date";

/// Access key pair plus the region requests are scoped to.
#[derive(Clone)]
pub struct Signer {
    access_key: String,
    secret_key: String,
    region: String,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("access_key", &self.access_key)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl Signer {
    pub fn new(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            region: region.into(),
        }
    }

    /// Compute the `Authorization` header value.
    ///
    /// `headers` are the headers to sign besides `host`, which is taken from `url`. They
    /// must include `x-amz-date` formatted from `at` and `x-amz-content-sha256`.
    pub fn authorization(
        &self,
        method: &str,
        url: &Url,
        headers: &[(&str, String)],
        payload_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<String, SyncError> {
        let (canonical, signed_headers) = canonical_request(method, url, headers, payload_hash);
        let date = at.format("%Y%m%d").to_string();
        let scope = format!("{date}/{}/{SERVICE}/aws4_request", self.region);
        let string_to_sign = format!(
            "{ALGORITHM}\n{}\n{scope}\n{}",
            amz_date(at),
            hex::encode(Sha256::digest(canonical.as_bytes()))
        );

        let mut key = hmac(format!("AWS4{}", self.secret_key).as_bytes(), date.as_bytes())?;
        for part in [self.region.as_str(), SERVICE, "aws4_request"] {
            key = hmac(&key, part.as_bytes())?;
        }
        let signature = hex::encode(hmac(&key, string_to_sign.as_bytes())?);

        Ok(format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            self.access_key
        ))
    }
}

/// `x-amz-date` value for `at`.
pub fn amz_date(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Hex SHA-256 of a request body.
pub fn payload_hash(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

/// Percent-encode everything outside the unreserved set, as SigV4 canonical URIs require.
pub fn uri_encode(segment: &str) -> String {
    let mut encoded = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>, SyncError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|err| SyncError::ObjectStoreFailure(format!("invalid signing key: {err}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn host(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

/// Returns the canonical request and the `;`-joined signed header names.
fn canonical_request(
    method: &str,
    url: &Url,
    headers: &[(&str, String)],
    payload_hash: &str,
) -> (String, String) {
    let mut canonical_headers: Vec<(String, String)> = headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.trim().to_string()))
        .chain(std::iter::once(("host".to_string(), host(url))))
        .collect();
    canonical_headers.sort();

    let signed_headers = canonical_headers
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");
    let header_block: String = canonical_headers
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect();

    let canonical = format!(
        "{method}\n{}\n{}\n{header_block}\n{signed_headers}\n{payload_hash}",
        url.path(),
        url.query().unwrap_or_default()
    );
    (canonical, signed_headers)
}
