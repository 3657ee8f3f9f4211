//! Tracing bootstrap.
//!
//! The bridge emits structured `tracing` events throughout dispatch and
//! marshalling; this module wires up a subscriber for hosts that do not
//! install their own. Initialization is opt-in and idempotent, so library
//! users and tests can call it freely.

use tracing_error::ErrorLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Install the default subscriber: env-filtered fmt output plus span
/// traces on errors. Returns quietly when a subscriber is already set.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(ErrorLayer::default())
        .try_init();
}
