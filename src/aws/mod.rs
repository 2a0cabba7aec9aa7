pub mod athena;
pub mod location;
pub mod s3;
pub mod sns;

pub use athena::{AthenaEngine, QueryEngine, QueryStatus};
pub use location::S3Location;
pub use s3::{ObjectStore, S3Store};
pub use sns::{Notifier, SnsNotifier};

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_s3::error::DisplayErrorContext;
use std::sync::Arc;

use crate::utils::Config;

/// AWS Clients, einmal pro Prozess aus der Konfiguration erzeugt
#[derive(Clone)]
pub struct AwsClients {
    pub store: Arc<dyn ObjectStore>,
    pub engine: Arc<dyn QueryEngine>,
    pub notifier: Arc<dyn Notifier>,
}

impl AwsClients {
    pub async fn from_config(config: &Config) -> Self {
        let sdk_config = load_sdk_config(&config.region, config.endpoint_url.as_deref()).await;

        tracing::info!(
            region = %config.region,
            endpoint = config.endpoint_url.as_deref().unwrap_or("default"),
            "AWS clients initialized"
        );

        Self {
            store: Arc::new(S3Store::new(&sdk_config)),
            engine: Arc::new(AthenaEngine::new(&sdk_config)),
            notifier: Arc::new(SnsNotifier::new(&sdk_config)),
        }
    }
}

async fn load_sdk_config(region: &str, endpoint_url: Option<&str>) -> SdkConfig {
    let mut loader =
        aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_string()));

    if let Some(url) = endpoint_url {
        loader = loader.endpoint_url(url);
    }

    loader.load().await
}

/// SDK-Fehler inklusive aller Ursachen als anyhow::Error
pub(crate) fn sdk_error<E>(err: E) -> anyhow::Error
where
    E: std::error::Error,
{
    anyhow::anyhow!("{}", DisplayErrorContext(&err))
}
