// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Object storage: bytes, strings and streamed files.
//!
//! Requests use path-style addressing (`<endpoint>/<bucket>/<key>`) so an
//! endpoint override can point at a local emulator.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Method, Response, StatusCode};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use crate::client::{ControlPlaneClient, SignedCall};
use crate::error::{Error, Result};
use crate::signing::{sha256_hex, uri_encode};

/// URI scheme of fully qualified object locations.
pub const S3_SCHEME: &str = "s3://";

/// A bucket/key pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectLocation {
    /// Bucket name.
    pub bucket: String,
    /// Object key, without leading or trailing slashes.
    pub key: String,
}

impl ObjectLocation {
    /// Create a location, normalizing surrounding whitespace and slashes.
    pub fn new(bucket: &str, key: &str) -> Result<Self> {
        let bucket = bucket.trim();
        let key = key.trim().trim_matches('/');
        if bucket.is_empty() || key.is_empty() {
            return Err(Error::Validation("bucket and key are required".to_string()));
        }
        Ok(Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    /// Resolve a reference: either `s3://bucket/key` or a bare key in `default_bucket`.
    ///
    /// Empty and malformed references are rejected without touching the network.
    pub fn parse(reference: &str, default_bucket: Option<&str>) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(Error::Validation("empty object reference".to_string()));
        }

        if let Some(rest) = reference.strip_prefix(S3_SCHEME) {
            return match rest.split_once('/') {
                Some((bucket, key)) if !bucket.trim().is_empty() && !key.trim().is_empty() => {
                    Self::new(bucket, key)
                }
                _ => Err(Error::Validation(format!(
                    "invalid object reference: {}",
                    reference
                ))),
            };
        }

        match default_bucket.map(str::trim).filter(|b| !b.is_empty()) {
            Some(bucket) => Self::new(bucket, reference),
            None => Err(Error::Config(
                "default bucket is not configured".to_string(),
            )),
        }
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}", S3_SCHEME, self.bucket, self.key)
    }
}

/// Durable object storage used for backups and markers.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `body` under `location`, replacing any previous object.
    async fn put_bytes(&self, location: &ObjectLocation, body: Vec<u8>) -> Result<()>;

    /// Read the whole object. A missing key is [`Error::ObjectNotFound`].
    async fn get_bytes(&self, location: &ObjectLocation) -> Result<Vec<u8>>;

    /// Stream a local file into the store.
    async fn upload_file(&self, location: &ObjectLocation, path: &Path) -> Result<()>;

    /// Stream an object into a local file, creating parent directories.
    async fn download_file(&self, location: &ObjectLocation, path: &Path) -> Result<()>;

    /// Store a UTF-8 string.
    async fn put_string(&self, location: &ObjectLocation, value: &str) -> Result<()> {
        self.put_bytes(location, value.as_bytes().to_vec()).await
    }

    /// Read an object as UTF-8.
    async fn get_string(&self, location: &ObjectLocation) -> Result<String> {
        let bytes = self.get_bytes(location).await?;
        String::from_utf8(bytes)
            .map_err(|_| Error::Validation(format!("object {} is not valid UTF-8", location)))
    }
}

async fn hash_file(path: &Path) -> Result<(String, u64)> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| Error::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    let mut len = 0u64;
    loop {
        let n = file.read(&mut buf).await.map_err(|e| Error::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        len += n as u64;
    }
    Ok((hex::encode(hasher.finalize()), len))
}

/// Error code of an S3 XML error body, if any.
fn error_code(body: &str) -> Option<&str> {
    let start = body.find("<Code>")? + "<Code>".len();
    let len = body[start..].find("</Code>")?;
    Some(body[start..start + len].trim())
}

/// Only an absent key counts; a 404 for a missing bucket is a hard failure.
fn is_missing_key(status: StatusCode, body: &str) -> bool {
    match error_code(body) {
        Some(code) => matches!(code, "NoSuchKey" | "NotFound"),
        None => status == StatusCode::NOT_FOUND,
    }
}

impl ControlPlaneClient {
    fn object_url(&self, operation: &str, location: &ObjectLocation) -> Result<url::Url> {
        let raw = format!(
            "{}/{}/{}",
            self.s3_endpoint,
            uri_encode(&location.bucket, true),
            uri_encode(&location.key, false)
        );
        self.parse_url(operation, &raw)
    }

    async fn put_object(
        &self,
        location: &ObjectLocation,
        payload_hash: String,
        content_length: u64,
        body: reqwest::Body,
    ) -> Result<()> {
        let url = self.object_url("PutObject", location)?;
        let response = self
            .send(SignedCall {
                operation: "PutObject",
                service: "s3",
                method: Method::PUT,
                url,
                headers: vec![
                    ("content-length".to_string(), content_length.to_string()),
                    ("x-amz-content-sha256".to_string(), payload_hash.clone()),
                ],
                payload_hash,
                body,
            })
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error("PutObject", response).await);
        }
        debug!(object = %location, bytes = content_length, "Stored object");
        Ok(())
    }

    async fn get_object(&self, location: &ObjectLocation) -> Result<Response> {
        let url = self.object_url("GetObject", location)?;
        let payload_hash = sha256_hex(b"");
        let response = self
            .send(SignedCall {
                operation: "GetObject",
                service: "s3",
                method: Method::GET,
                url,
                headers: vec![("x-amz-content-sha256".to_string(), payload_hash.clone())],
                payload_hash,
                body: reqwest::Body::from(Vec::new()),
            })
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if is_missing_key(status, &body) {
            return Err(Error::ObjectNotFound {
                bucket: location.bucket.clone(),
                key: location.key.clone(),
            });
        }
        Err(Error::Api {
            operation: "GetObject".to_string(),
            status: status.as_u16(),
            message: match body.trim() {
                "" => status.canonical_reason().unwrap_or("unknown error").to_string(),
                trimmed => trimmed.to_string(),
            },
        })
    }
}

#[async_trait]
impl ObjectStore for ControlPlaneClient {
    async fn put_bytes(&self, location: &ObjectLocation, body: Vec<u8>) -> Result<()> {
        let hash = sha256_hex(&body);
        let len = body.len() as u64;
        self.put_object(location, hash, len, body.into()).await
    }

    async fn get_bytes(&self, location: &ObjectLocation) -> Result<Vec<u8>> {
        let response = self.get_object(location).await?;
        let bytes = response.bytes().await.map_err(|source| Error::Http {
            operation: "GetObject".to_string(),
            source,
        })?;
        Ok(bytes.to_vec())
    }

    async fn upload_file(&self, location: &ObjectLocation, path: &Path) -> Result<()> {
        let (hash, len) = hash_file(path).await?;
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| Error::io(path, e))?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));

        self.put_object(location, hash, len, body).await?;
        info!(object = %location, path = %path.display(), bytes = len, "Uploaded file");
        Ok(())
    }

    async fn download_file(&self, location: &ObjectLocation, path: &Path) -> Result<()> {
        let response = self.get_object(location).await?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io(parent, e))?;
        }
        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|e| Error::io(path, e))?;

        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| Error::Http {
                operation: "GetObject".to_string(),
                source,
            })?;
            file.write_all(&chunk)
                .await
                .map_err(|e| Error::io(path, e))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| Error::io(path, e))?;

        info!(object = %location, path = %path.display(), bytes = written, "Downloaded file");
        Ok(())
    }
}
