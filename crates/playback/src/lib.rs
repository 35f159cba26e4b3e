//! Adaptive playback controller for live HLS streams.
//!
//! The crate drives a segmented-media [`DeliveryEngine`] attached to a [`MediaElement`] and
//! keeps a live stream watchable on constrained devices: it pins a startup quality level,
//! watches buffer health and steps quality down on sustained stalls, keeps latency close to
//! the live edge by nudging the playback rate or seeking, and recovers from engine errors
//! with bounded retries. Progress and failures are published as structured
//! [`StatusSignal`]s on a watch channel.
//!
//! Engines and media elements are host collaborators behind traits, so the controller runs
//! the same against a browser binding or a test double.

pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod logging;
pub mod media;
pub mod monitor;
pub mod quality;
pub mod recovery;
pub mod session;
pub mod source;
pub mod status;
pub mod subscription;

pub use config::PlayerConfig;
pub use controller::PlaybackController;
pub use engine::{DeliveryEngine, EngineEvent, EngineFactory, LevelSelection, QualityLevel};
pub use error::{PlaybackError, Result};
pub use media::{MediaElement, MediaEvent, TimeRange};
pub use monitor::{NetworkQualityState, NetworkTier};
pub use recovery::{ErrorEvent, ErrorKind};
pub use session::SessionState;
pub use status::{ErrorReason, LoadingReason, StatusSignal};
pub use subscription::Subscription;
