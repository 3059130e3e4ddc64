//! Client configuration constants.
//!
//! Centralizes hardcoded values for easier configuration and documentation.

use std::time::Duration;

/// Default server for local development.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3001";

/// Local profile used when none is given.
pub const DEFAULT_PROFILE: &str = "default";

/// Timeout applied to every HTTP call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Attempts per push before falling back to local storage.
pub const PUSH_ATTEMPTS: u32 = 3;

/// Delay before the second push attempt; doubles each retry.
pub const PUSH_BACKOFF: Duration = Duration::from_millis(250);

/// First realtime reconnect delay; doubles each attempt.
pub const RECONNECT_INITIAL: Duration = Duration::from_millis(500);

/// Ceiling for the realtime reconnect delay.
pub const RECONNECT_MAX: Duration = Duration::from_secs(30);

/// Namespace for every local key.
pub const KEY_PREFIX: &str = "GRAMSEVA_";

/// Local key holding the signed-in account snapshot.
pub const SESSION_KEY: &str = "GRAMSEVA_SESSION";

/// Local key prefix for per-resident onboarding flags.
pub const ONBOARDED_PREFIX: &str = "GRAMSEVA_ONBOARDED_";

/// Local key prefix marking a cached collection the server has not seen yet.
pub const PENDING_PREFIX: &str = "GRAMSEVA_PENDING_";

/// Store change notification buffer.
pub const STORE_EVENT_CAPACITY: usize = 256;
