//! Mailprobe Scanner - availability probing and reputation scoring.
//!
//! This crate drives signup forms and the reputation page through the
//! browser abstraction, turning noisy page signals into durable results.
//!
//! # Features
//!
//! - Two-track debounced classifier with sticky busy bias
//! - Per-domain workers that shed broken sessions and retry
//! - Reputation scoring with backoff, jitter and an "unable" circuit breaker
//! - Resumable batches: every verdict is cached before it counts as done
//! - Cooperative cancellation through a shared `CancellationToken`
//!
//! # Example
//!
//! ```rust,ignore
//! use mailprobe_scanner::BatchCoordinator;
//! use std::sync::Arc;
//!
//! let coordinator = BatchCoordinator::new(
//!     Arc::new(config),
//!     Arc::new(ChromiumFactory::new(config.browser.clone())),
//!     Arc::new(cache),
//!     cancel.clone(),
//! );
//!
//! let summary = coordinator.run_availability(&mut pending, &run_dir).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#[allow(missing_docs)]
pub mod classifier;
#[allow(missing_docs)]
pub mod coordinator;
pub mod credentials;
#[allow(missing_docs)]
pub mod error;
#[allow(missing_docs)]
pub mod gauge;
#[allow(missing_docs)]
pub mod reputation;
#[allow(missing_docs)]
pub mod retry;
#[allow(missing_docs)]
pub mod sampler;
#[allow(missing_docs)]
pub mod worker;

// Re-export commonly used types
pub use classifier::{classify, ClassifierTiming, SignalSampler};
pub use coordinator::{BatchCoordinator, ReputationSummary, RunSummary};
pub use credentials::generate_password;
pub use error::{Cancelled, Result, ScanError};
pub use gauge::{BrowserGauge, GaugeReading, ReputationGauge};
pub use reputation::{ReputationOrchestrator, ReputationOutcome};
pub use retry::{AttemptOutcome, RetryDecision, RetryPolicy, SessionRecycle};
pub use sampler::{BusyMatcher, PageSignalSampler};
pub use worker::{DomainProbeWorker, WorkerReport};
