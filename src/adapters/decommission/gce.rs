//! Compute Engine instance deletion
//!
//! Identity and an access token come from the instance metadata server; the
//! instance then deletes itself through the Compute Engine API.

use super::Decommissioner;
use crate::domain::{MatrikelError, Result};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use serde::Deserialize;
use std::time::Duration;

const METADATA_FLAVOR: (&str, &str) = ("Metadata-Flavor", "Google");

#[derive(Debug, Deserialize)]
struct AccessToken {
    access_token: String,
}

/// Identity of the running instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceIdentity {
    pub project: String,
    pub zone: String,
    pub name: String,
}

pub struct GceDecommissioner {
    client: Client,
    metadata_url: String,
    compute_api_url: String,
}

impl GceDecommissioner {
    pub fn new(metadata_url: &str, compute_api_url: &str) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| MatrikelError::Decommission(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            metadata_url: metadata_url.trim_end_matches('/').to_string(),
            compute_api_url: compute_api_url.trim_end_matches('/').to_string(),
        })
    }

    async fn metadata(&self, path: &str) -> Result<String> {
        let url = format!("{}/{path}", self.metadata_url);
        let response = self
            .client
            .get(&url)
            .header(METADATA_FLAVOR.0, METADATA_FLAVOR.1)
            .send()
            .await
            .map_err(|e| MatrikelError::Decommission(format!("metadata {path}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MatrikelError::Decommission(format!(
                "metadata {path} returned {status}"
            )));
        }
        response
            .text()
            .await
            .map(|body| body.trim().to_string())
            .map_err(|e| MatrikelError::Decommission(format!("metadata {path}: {e}")))
    }

    /// Project, zone and name of this instance
    pub async fn identity(&self) -> Result<InstanceIdentity> {
        let project = self.metadata("project/project-id").await?;
        // projects/<number>/zones/<zone>
        let zone_path = self.metadata("instance/zone").await?;
        let zone = zone_path.rsplit('/').next().unwrap_or_default().to_string();
        let name = self.metadata("instance/name").await?;

        if project.is_empty() || zone.is_empty() || name.is_empty() {
            return Err(MatrikelError::Decommission(
                "metadata server returned an incomplete instance identity".to_string(),
            ));
        }
        Ok(InstanceIdentity {
            project,
            zone,
            name,
        })
    }

    async fn access_token(&self) -> Result<String> {
        let body = self
            .metadata("instance/service-accounts/default/token")
            .await?;
        let token: AccessToken = serde_json::from_str(&body)
            .map_err(|e| MatrikelError::Decommission(format!("invalid token response: {e}")))?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl Decommissioner for GceDecommissioner {
    async fn delete_self(&self) -> Result<()> {
        let identity = self.identity().await?;
        let token = self.access_token().await?;
        let url = format!(
            "{}/projects/{}/zones/{}/instances/{}",
            self.compute_api_url, identity.project, identity.zone, identity.name
        );

        tracing::warn!(
            project = %identity.project,
            zone = %identity.zone,
            instance = %identity.name,
            "Deleting this instance"
        );

        let response = self
            .client
            .delete(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| MatrikelError::Decommission(format!("delete request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MatrikelError::Decommission(format!(
                "delete returned {status}: {body}"
            )));
        }

        tracing::info!(instance = %identity.name, "Instance deletion accepted");
        Ok(())
    }
}
