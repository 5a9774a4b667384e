use anyhow::Context;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    presigning::PresigningConfig,
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use axum::{async_trait, extract::Multipart};
use bytes::Bytes;
use uuid::Uuid;

use crate::{config::AppConfig, error::AppError};

/// Lifetime of presigned image links handed to clients.
pub const PRESIGN_TTL_SECS: u64 = 30 * 60;

/// Request body cap for image upload routes.
pub const UPLOAD_LIMIT_BYTES: usize = 5 * 1024 * 1024;

#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()>;
    async fn delete_object(&self, key: &str) -> anyhow::Result<()>;
    async fn presign_get(&self, key: &str, seconds: u64) -> anyhow::Result<String>;
}

/// S3/MinIO object store for avatars and course images.
#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
}

impl Storage {
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(Credentials::new(
                &config.minio_access_key,
                &config.minio_secret_key,
                None,
                None,
                "static",
            ))
            .endpoint_url(&config.minio_endpoint)
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(&config.minio_endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            bucket: config.minio_bucket.clone(),
        })
    }
}

#[async_trait]
impl StorageClient for Storage {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .context("s3 put_object")?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .context("s3 delete_object")?;
        Ok(())
    }

    async fn presign_get(&self, key: &str, seconds: u64) -> anyhow::Result<String> {
        let req = self.client.get_object().bucket(&self.bucket).key(key);
        let presigned = req
            .presigned(PresigningConfig::expires_in(
                std::time::Duration::from_secs(seconds),
            )?)
            .await
            .context("s3 presign_get")?;
        Ok(presigned.uri().to_string())
    }
}

/// An uploaded image as read from a multipart field.
pub struct ImageUpload {
    pub body: Bytes,
    pub content_type: String,
}

pub fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

/// Pulls the named file field out of a multipart body. Other fields are
/// skipped. Missing, empty or non-image parts are validation errors on `field`.
pub async fn read_image_field(
    mut mp: Multipart,
    field: &'static str,
) -> Result<ImageUpload, AppError> {
    while let Some(part) = mp
        .next_field()
        .await
        .map_err(|e| AppError::validation(field, format!("Malformed upload: {e}")))?
    {
        if part.name() != Some(field) {
            continue;
        }
        let content_type = part
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".into());
        if ext_from_mime(&content_type).is_none() {
            return Err(AppError::validation(
                field,
                "Upload a valid image. Supported types are JPEG, PNG, WebP and GIF.",
            ));
        }
        let body = part
            .bytes()
            .await
            .map_err(|e| AppError::validation(field, format!("Malformed upload: {e}")))?;
        if body.is_empty() {
            return Err(AppError::validation(field, "The submitted file is empty."));
        }
        return Ok(ImageUpload { body, content_type });
    }
    Err(AppError::validation(field, "No file was submitted."))
}

/// Stores the image under `prefix/<uuid>.<ext>` and returns the object key.
/// Callers check the content type with [`ext_from_mime`] beforehand.
pub async fn store_image(
    storage: &dyn StorageClient,
    prefix: &str,
    image: ImageUpload,
) -> anyhow::Result<String> {
    let ext = ext_from_mime(&image.content_type).unwrap_or("bin");
    let key = format!("{}/{}.{}", prefix, Uuid::new_v4(), ext);
    storage
        .put_object(&key, image.body, &image.content_type)
        .await
        .with_context(|| format!("put_object {}", key))?;
    Ok(key)
}

/// Presigned link for an optional object key. Presigning failures are logged
/// and rendered as a missing image.
pub async fn image_url(storage: &dyn StorageClient, key: Option<&str>) -> Option<String> {
    let key = key?;
    match storage.presign_get(key, PRESIGN_TTL_SECS).await {
        Ok(url) => Some(url),
        Err(e) => {
            tracing::warn!(error = %e, key, "presign failed");
            None
        }
    }
}
