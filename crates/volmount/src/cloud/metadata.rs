//! Instance identity from the metadata service.

use async_trait::async_trait;
use aws_config::imds;
use aws_sdk_ec2::error::DisplayErrorContext;
use volmount_common::{InstanceId, VolmountError, VolmountResult};

use super::{Instance, InstanceIdentity};

/// Link-local address of the metadata service.
pub const DEFAULT_METADATA_ENDPOINT: &str = "http://169.254.169.254";

const INSTANCE_ID_PATH: &str = "/latest/meta-data/instance-id";
const REGION_PATH: &str = "/latest/meta-data/placement/region";

fn unavailable(message: impl Into<String>) -> VolmountError {
    VolmountError::MetadataUnavailable {
        message: message.into(),
    }
}

/// Client for the instance metadata service.
#[derive(Debug, Clone)]
pub struct MetadataClient {
    client: imds::Client,
}

impl MetadataClient {
    /// Create a client talking to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`VolmountError::MetadataUnavailable`] if `endpoint` is not a
    /// valid URI.
    pub fn new(endpoint: &str) -> VolmountResult<Self> {
        let client = imds::Client::builder()
            .endpoint(endpoint)
            .map_err(|e| unavailable(format!("invalid metadata endpoint {endpoint}: {e}")))?
            .build();
        Ok(Self { client })
    }

    /// Fetch `path`, returning the trimmed, non-empty value.
    ///
    /// # Errors
    ///
    /// Returns [`VolmountError::MetadataUnavailable`] on any failure or an
    /// empty value.
    pub async fn get(&self, path: &str) -> VolmountResult<String> {
        tracing::debug!(path, "Querying instance metadata");
        let value = self
            .client
            .get(path)
            .await
            .map_err(|e| unavailable(format!("{path}: {}", DisplayErrorContext(&e))))?;
        let text: &str = value.as_ref();
        non_empty(path, text)
    }
}

fn non_empty(path: &str, value: &str) -> VolmountResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(unavailable(format!("empty response for {path}")));
    }
    Ok(value.to_string())
}

fn identity(id: &str, region: String) -> VolmountResult<Instance> {
    let id = InstanceId::new(id).map_err(|e| unavailable(e.to_string()))?;
    Ok(Instance { id, region })
}

#[async_trait]
impl InstanceIdentity for MetadataClient {
    async fn resolve(&self) -> VolmountResult<Instance> {
        let region = self.get(REGION_PATH).await?;
        let id = self.get(INSTANCE_ID_PATH).await?;
        let instance = identity(&id, region)?;

        tracing::debug!(instance = %instance.id, region = %instance.region, "Resolved instance identity");
        Ok(instance)
    }
}
