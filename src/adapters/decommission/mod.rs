//! Self-decommission of the host instance after a successful run

pub mod gce;

use crate::config::{DecommissionTarget, LifecycleConfig};
use crate::domain::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub use gce::GceDecommissioner;

/// Deletes the machine this process runs on
#[async_trait]
pub trait Decommissioner: Send + Sync {
    /// Request deletion of the current instance
    ///
    /// # Errors
    ///
    /// Returns `MatrikelError::Decommission` if the request is rejected.
    async fn delete_self(&self) -> Result<()>;
}

/// Logs instead of deleting anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDecommissioner;

#[async_trait]
impl Decommissioner for NoopDecommissioner {
    async fn delete_self(&self) -> Result<()> {
        tracing::info!("No decommissioner configured, leaving instance running");
        Ok(())
    }
}

/// Create the decommissioner selected by configuration
pub fn create_decommissioner(config: &LifecycleConfig) -> Result<Arc<dyn Decommissioner>> {
    match config.decommissioner {
        DecommissionTarget::None => Ok(Arc::new(NoopDecommissioner)),
        DecommissionTarget::Gce => Ok(Arc::new(GceDecommissioner::new(
            &config.metadata_url,
            &config.compute_api_url,
        )?)),
    }
}
