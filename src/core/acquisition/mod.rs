//! Remote acquisition
//!
//! Secrets are fetched first, then the host is resolved under a
//! [`RetryPolicy`], a key-authenticated session is opened and the newest
//! matching archive is streamed to local disk.

pub mod fetch;
pub mod resolver;
pub mod retry;

pub use fetch::{select_latest, Acquirer, DownloadedArchive, ResolvedSource};
pub use resolver::{HostResolver, SystemResolver};
pub use retry::{sleep_or_cancel, RecordingSleeper, RetryError, RetryPolicy, Sleeper, TokioSleeper};
