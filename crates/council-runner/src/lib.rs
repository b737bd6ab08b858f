//! Council runner: CLI and hosting-platform glue around the `council` library.
//!
//! ```text
//! commands ──▶ council (wave gate, aggregation, records)
//!    │
//!    └──▶ publish ──▶ platform::ReviewPlatform ◀── github::GitHubClient
//!                                                     │
//!                                                   retry
//! ```

pub mod commands;
pub mod github;
pub mod platform;
pub mod publish;
pub mod retry;

pub use platform::{
    PlatformError, PullRequestInfo, PullRequestRef, ReviewEvent, ReviewPlatform,
    ReviewSubmission,
};
pub use publish::{PublishOutcome, PublishReport, ReviewPublisher};
pub use retry::{with_retry, RetryPolicy};
