//! Outbound notification delivery for emergency alerts.
//!
//! - [`Provider`]: the messaging/calling provider seam.
//! - [`GatewayProvider`]: HTTP client for the provider gateway.
//! - [`RecordingProvider`]: in-process provider for dry runs and tests.
//! - [`Dispatcher`]: the single task that owns the provider session and
//!   executes [`DispatchJob`](centinela_core::policy::DispatchJob)s one at a
//!   time, fed through a bounded queue by [`DispatcherHandle`]s.

pub mod dispatcher;
pub mod gateway;
pub mod protocol;
pub mod provider;
pub mod recording;
pub mod report;

pub use dispatcher::{DispatchError, Dispatcher, DispatcherConfig, DispatcherHandle};
pub use gateway::{GatewayConfig, GatewayProvider};
pub use provider::{PeerHandle, Provider, ProviderError, ProviderStatus};
pub use recording::RecordingProvider;
pub use report::{DeliveryOutcome, DestinationReport, JobOutcome, JobReport};
