//! Object-store gateway (component D): upload, existence probe, and
//! signed-URL minting with ambient or impersonated credentials.

pub mod signing;

use std::path::Path;

use google_cloud_storage::client::{Client, ClientConfig};
use google_cloud_storage::http::objects::delete::DeleteObjectRequest;
use google_cloud_storage::http::objects::get::GetObjectRequest;
use google_cloud_storage::http::objects::rewrite::RewriteObjectRequest;
use google_cloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};

use loist_common::{Error, ErrorKind, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignMethod {
    Get,
    Put,
}

pub struct ObjectStoreGateway {
    client: Client,
    bucket: String,
    signer: signing::UrlSigner,
}

impl ObjectStoreGateway {
    pub async fn connect(bucket: String, impersonate_service_account: Option<String>) -> Result<Self> {
        let config = ClientConfig::default().with_auth().await.map_err(|e| {
            Error::retriable(ErrorKind::StorageError, format!("ambient credential resolution failed: {e}"))
        })?;
        let client = Client::new(config);
        let signer = signing::UrlSigner::new(impersonate_service_account).await?;
        Ok(Self { client, bucket, signer })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Upload bytes from a local path to `key` under the bucket.
    pub async fn upload(&self, local_path: &Path, key: &str, content_type: &str) -> Result<()> {
        let bytes = tokio::fs::read(local_path)
            .await
            .map_err(|e| Error::internal(format!("failed to read local file for upload: {e}")))?;

        let upload_type = UploadType::Simple(Media {
            name: key.to_string().into(),
            content_type: content_type.to_string().into(),
            content_length: Some(bytes.len() as u64),
        });

        self.client
            .upload_object(
                &UploadObjectRequest {
                    bucket: self.bucket.clone(),
                    ..Default::default()
                },
                bytes,
                &upload_type,
            )
            .await
            .map_err(|e| classify_storage_error(&e.to_string(), "upload"))?;

        Ok(())
    }

    /// Existence probe; only meaningful for `GET`-style reads.
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let result = self
            .client
            .get_object(&GetObjectRequest {
                bucket: self.bucket.clone(),
                object: key.to_string(),
                ..Default::default()
            })
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) if e.to_string().contains("404") => Ok(false),
            Err(e) => Err(classify_storage_error(&e.to_string(), "exists")),
        }
    }

    /// Server-side copy within the bucket (orphan sweep's quarantine move
    /// and the teacher's lack of a client-side read-modify-upload round
    /// trip for same-bucket relocations).
    pub async fn copy(&self, src_key: &str, dest_key: &str) -> Result<()> {
        self.client
            .rewrite_object(&RewriteObjectRequest {
                destination_bucket: self.bucket.clone(),
                destination_object: dest_key.to_string(),
                source_bucket: self.bucket.clone(),
                source_object: src_key.to_string(),
                ..Default::default()
            })
            .await
            .map_err(|e| classify_storage_error(&e.to_string(), "copy"))?;
        Ok(())
    }

    /// Delete an object outright. Used by the orphan sweep once a blob has
    /// been quarantined for longer than the audit window.
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object(&DeleteObjectRequest {
                bucket: self.bucket.clone(),
                object: key.to_string(),
                ..Default::default()
            })
            .await
            .map_err(|e| classify_storage_error(&e.to_string(), "delete"))?;
        Ok(())
    }

    /// Mint a time-limited signed URL. Side-effect-free and idempotent
    /// within a single call; callers should front this with the signed-URL
    /// cache (component E) rather than calling it per request.
    pub async fn sign(
        &self,
        key: &str,
        ttl: std::time::Duration,
        method: SignMethod,
        content_type: Option<&str>,
        disposition: Option<&str>,
    ) -> Result<(String, chrono::DateTime<chrono::Utc>)> {
        self.signer
            .sign(&self.bucket, key, ttl, method, content_type, disposition)
            .await
    }
}

fn classify_storage_error(message: &str, op: &'static str) -> Error {
    let retriable = message.contains("500")
        || message.contains("502")
        || message.contains("503")
        || message.contains("504")
        || message.to_lowercase().contains("timeout");
    if retriable {
        Error::retriable(ErrorKind::StorageError, format!("{op} failed: {message}"))
    } else {
        Error::terminal(ErrorKind::StorageError, format!("{op} failed: {message}"))
    }
}
