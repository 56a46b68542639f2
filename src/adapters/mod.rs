//! External system integrations for Matrikel.
//!
//! Every outside system sits behind a trait so the run coordinator can be
//! exercised with in-memory fakes:
//!
//! - [`secrets`] - [`SecretStore`](secrets::SecretStore): environment or mounted files
//! - [`transport`] - [`RemoteTransport`](transport::RemoteTransport): SFTP over libssh2
//! - [`storage`] - [`DurableStorage`](storage::DurableStorage): local directory or S3 bucket
//! - [`decommission`] - [`Decommissioner`](decommission::Decommissioner): Compute Engine self-delete
//!
//! Each module exposes a `create_*` factory that picks the backend from
//! configuration.

pub mod decommission;
pub mod secrets;
pub mod storage;
pub mod transport;
