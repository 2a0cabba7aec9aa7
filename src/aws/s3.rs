use anyhow::Result;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

use crate::aws::location::{copy_source, S3Location};
use crate::aws::sdk_error;

/// Objektspeicher für Landing-Datei, Report und Archiv
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_object(&self, location: &S3Location) -> Result<Vec<u8>>;

    /// Überschreibt ein vorhandenes Objekt
    async fn put_object(&self, location: &S3Location, body: Vec<u8>) -> Result<()>;

    async fn copy_object(&self, from: &S3Location, to: &S3Location) -> Result<()>;

    async fn delete_object(&self, location: &S3Location) -> Result<()>;
}

/// S3 Storage Layer
pub struct S3Store {
    client: Client,
}

impl S3Store {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn get_object(&self, location: &S3Location) -> Result<Vec<u8>> {
        let output = self
            .client
            .get_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .send()
            .await
            .map_err(sdk_error)?;

        let bytes = output.body.collect().await?.into_bytes();
        tracing::debug!(location = %location, size = bytes.len(), "Object downloaded");

        Ok(bytes.to_vec())
    }

    async fn put_object(&self, location: &S3Location, body: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(sdk_error)?;

        Ok(())
    }

    async fn copy_object(&self, from: &S3Location, to: &S3Location) -> Result<()> {
        self.client
            .copy_object()
            .copy_source(copy_source(from))
            .bucket(&to.bucket)
            .key(&to.key)
            .send()
            .await
            .map_err(sdk_error)?;

        Ok(())
    }

    async fn delete_object(&self, location: &S3Location) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .send()
            .await
            .map_err(sdk_error)?;

        Ok(())
    }
}
