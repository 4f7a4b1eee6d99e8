//! MinIO/S3-compatible blob store.
//!
//! Uses the rust-s3 crate for object operations. Transfers above the part
//! size go through the S3 multipart API so progress can be reported per part;
//! smaller blobs are single PUTs.

use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, Url};
use s3::creds::Credentials;
use s3::serde_types::Part;
use s3::{Bucket, BucketConfiguration, Region};
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use async_trait::async_trait;

use crate::core::config::StorageConfig;
use crate::core::error::{AppError, Result};
use crate::modules::storage::{BlobStore, ProgressSink, StoredBlob};

type HmacSha256 = Hmac<Sha256>;

/// Part size for multipart transfers. Blobs at or below this size are sent
/// as a single PUT; S3 requires at least 5 MiB for non-final parts.
const PART_SIZE: usize = 8 * 1024 * 1024;

pub struct MinioStore {
    bucket: Box<Bucket>,
    region: Region,
    credentials: Credentials,
    endpoint: String,
    public_endpoint: String,
    access_key: String,
    secret_key: String,
    region_name: String,
    http_client: Client,
}

impl MinioStore {
    /// Create the store, ensuring the bucket exists and carries an
    /// anonymous-read policy so file URLs resolve without credentials.
    pub async fn new(config: StorageConfig) -> Result<Self> {
        let credentials = Credentials::new(
            Some(&config.access_key),
            Some(&config.secret_key),
            None,
            None,
            None,
        )
        .map_err(|e| AppError::Internal(format!("Failed to create storage credentials: {}", e)))?;

        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
        };

        let mut bucket = Bucket::new(&config.bucket, region.clone(), credentials.clone())
            .map_err(|e| AppError::Internal(format!("Failed to open storage bucket: {}", e)))?;

        // MinIO serves path-style URLs (http://endpoint/bucket/key)
        bucket.set_path_style();

        let http_client = Client::builder()
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let store = Self {
            bucket,
            region,
            credentials,
            endpoint: config.endpoint,
            public_endpoint: config.public_endpoint,
            access_key: config.access_key,
            secret_key: config.secret_key,
            region_name: config.region,
            http_client,
        };

        store.ensure_bucket_exists().await?;
        store.apply_public_read_policy().await;

        info!(
            "Blob store initialized: endpoint={}, bucket={}",
            store.endpoint,
            store.bucket.name()
        );

        Ok(store)
    }

    async fn ensure_bucket_exists(&self) -> Result<()> {
        let created = Bucket::create_with_path_style(
            &self.bucket.name(),
            self.region.clone(),
            self.credentials.clone(),
            BucketConfiguration::default(),
        )
        .await;

        match created {
            Ok(_) => {
                info!("Bucket '{}' created", self.bucket.name());
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                if message.contains("BucketAlreadyOwnedByYou")
                    || message.contains("BucketAlreadyExists")
                    || message.contains("already own it")
                {
                    debug!("Bucket '{}' already exists", self.bucket.name());
                    Ok(())
                } else {
                    warn!(
                        "Could not create bucket '{}': {}. Assuming it exists.",
                        self.bucket.name(),
                        e
                    );
                    Ok(())
                }
            }
        }
    }

    /// Attach an anonymous-read bucket policy. Failure is logged and not
    /// fatal; the policy can be set out of band.
    async fn apply_public_read_policy(&self) {
        let bucket_name = self.bucket.name();
        let policy = json!({
            "Version": "2012-10-17",
            "Statement": [{
                "Effect": "Allow",
                "Principal": {"AWS": "*"},
                "Action": ["s3:GetObject"],
                "Resource": [format!("arn:aws:s3:::{bucket_name}/*")]
            }]
        })
        .to_string();

        if let Err(e) = self.put_bucket_policy(&bucket_name, &policy).await {
            warn!(
                "Failed to set anonymous-read policy on '{}': {}. \
                 Set it manually with: mc anonymous set download minio/{}",
                bucket_name, e, bucket_name
            );
        } else {
            info!("Anonymous-read policy set for bucket '{}'", bucket_name);
        }
    }

    /// PUT the bucket policy, signing the request with AWS Signature v4
    /// (rust-s3 exposes no policy API).
    async fn put_bucket_policy(&self, bucket_name: &str, policy: &str) -> Result<()> {
        let now = Utc::now();
        let date_stamp = now.format("%Y%m%d").to_string();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();

        let endpoint_url = Url::parse(&self.endpoint)
            .map_err(|e| AppError::Internal(format!("Invalid endpoint URL: {}", e)))?;
        let host = endpoint_url
            .host_str()
            .ok_or_else(|| AppError::Internal("Endpoint URL has no host".to_string()))?;
        let host_header = match endpoint_url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        let payload_hash = hex::encode(Sha256::digest(policy.as_bytes()));
        let signed_headers = "host;x-amz-content-sha256;x-amz-date";
        let canonical_request = format!(
            "PUT\n/{bucket_name}\npolicy=\nhost:{host_header}\n\
             x-amz-content-sha256:{payload_hash}\nx-amz-date:{amz_date}\n\n\
             {signed_headers}\n{payload_hash}"
        );

        let scope = format!("{}/{}/s3/aws4_request", date_stamp, self.region_name);
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date,
            scope,
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );
        let signature = self.sign(&date_stamp, &string_to_sign)?;
        let authorization = format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            self.access_key, scope, signed_headers, signature
        );

        let response = self
            .http_client
            .put(format!("{}/{}?policy", self.endpoint, bucket_name))
            .header("Host", &host_header)
            .header("x-amz-date", &amz_date)
            .header("x-amz-content-sha256", &payload_hash)
            .header("Authorization", &authorization)
            .body(policy.to_string())
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Policy request failed: {}", e)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            Err(AppError::ExternalService(format!(
                "Bucket policy rejected: {} - {}",
                status, body
            )))
        }
    }

    fn sign(&self, date_stamp: &str, string_to_sign: &str) -> Result<String> {
        let k_date = Self::hmac(
            format!("AWS4{}", self.secret_key).as_bytes(),
            date_stamp.as_bytes(),
        )?;
        let k_region = Self::hmac(&k_date, self.region_name.as_bytes())?;
        let k_service = Self::hmac(&k_region, b"s3")?;
        let k_signing = Self::hmac(&k_service, b"aws4_request")?;
        Ok(hex::encode(Self::hmac(
            &k_signing,
            string_to_sign.as_bytes(),
        )?))
    }

    fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
        let mut mac = HmacSha256::new_from_slice(key)
            .map_err(|e| AppError::Internal(format!("HMAC key error: {}", e)))?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    /// Multipart transfer with per-part progress. Aborts the upload on any
    /// part failure so no incomplete multipart state is left behind.
    async fn put_multipart(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
        progress: &ProgressSink,
    ) -> Result<()> {
        let total = data.len() as u64;
        let initiated = self
            .bucket
            .initiate_multipart_upload(key, content_type)
            .await
            .map_err(|e| AppError::Transfer(format!("Failed to start transfer: {}", e)))?;
        let upload_id = initiated.upload_id;

        let mut parts: Vec<Part> = Vec::new();
        let mut sent: u64 = 0;
        for (index, chunk) in data.chunks(PART_SIZE).enumerate() {
            let part_number = (index + 1) as u32;
            let part = self
                .bucket
                .put_multipart_chunk(chunk.to_vec(), key, part_number, &upload_id, content_type)
                .await;

            match part {
                Ok(part) => {
                    sent += chunk.len() as u64;
                    progress(sent, total);
                    parts.push(part);
                }
                Err(e) => {
                    if let Err(abort_err) = self.bucket.abort_upload(key, &upload_id).await {
                        warn!("Failed to abort multipart upload '{}': {}", key, abort_err);
                    }
                    return Err(AppError::Transfer(format!(
                        "Part {} of '{}' failed: {}",
                        part_number, key, e
                    )));
                }
            }
        }

        self.bucket
            .complete_multipart_upload(key, &upload_id, parts)
            .await
            .map_err(|e| AppError::Transfer(format!("Failed to finish transfer: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl BlobStore for MinioStore {
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
        progress: ProgressSink,
    ) -> Result<StoredBlob> {
        let total = data.len() as u64;
        progress(0, total);

        if data.len() <= PART_SIZE {
            self.bucket
                .put_object_with_content_type(key, &data, content_type)
                .await
                .map_err(|e| AppError::Transfer(format!("Failed to upload '{}': {}", key, e)))?;
            progress(total, total);
        } else {
            self.put_multipart(key, &data, content_type, &progress)
                .await?;
        }

        debug!("Uploaded blob '{}' ({} bytes)", key, total);

        Ok(StoredBlob {
            key: key.to_string(),
            size: total as i64,
            url: self.url_for(key),
        })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.bucket
            .delete_object(key)
            .await
            .map_err(|e| AppError::ExternalService(format!("Failed to delete '{}': {}", key, e)))?;

        debug!("Deleted blob '{}'", key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        match self.bucket.head_object(key).await {
            Ok(_) => Ok(true),
            Err(e) => {
                let message = e.to_string();
                if message.contains("404") || message.contains("NoSuchKey") {
                    Ok(false)
                } else {
                    Err(AppError::ExternalService(format!(
                        "Failed to check '{}': {}",
                        key, e
                    )))
                }
            }
        }
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}/{}", self.public_endpoint, self.bucket.name(), key)
    }
}
