use anyhow::Result;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sns::Client;

use crate::aws::sdk_error;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, topic_arn: &str, subject: &str, message: &str) -> Result<()>;
}

/// SNS Topic Publisher für Mismatch-Benachrichtigungen
pub struct SnsNotifier {
    client: Client,
}

impl SnsNotifier {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

#[async_trait]
impl Notifier for SnsNotifier {
    async fn publish(&self, topic_arn: &str, subject: &str, message: &str) -> Result<()> {
        let output = self
            .client
            .publish()
            .topic_arn(topic_arn)
            .subject(subject)
            .message(message)
            .send()
            .await
            .map_err(sdk_error)?;

        tracing::debug!(
            message_id = output.message_id().unwrap_or("-"),
            "SNS message published"
        );

        Ok(())
    }
}
