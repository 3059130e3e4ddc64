//! Server configuration constants.
//!
//! Centralizes hardcoded values for easier configuration and documentation.

use std::time::Duration;

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 3001;

/// Default bind address (localhost only).
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";

/// Default data directory, relative to the working directory.
pub const DEFAULT_DATA_DIR: &str = "data";

/// Officer-key pool is padded with random keys up to this size at first boot.
pub const DEFAULT_MIN_OFFICER_KEYS: usize = 200;

/// Realtime broadcast buffer. A subscriber that falls further behind is
/// resynchronized with every collection.
pub const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// Keys handed out by hand to pilot-village officers.
pub const MEMORABLE_OFFICER_KEYS: &[&str] = &[
    "OFFICER01",
    "OFFICER02",
    "OFFICER03",
    "OFFICER04",
    "OFFICER05",
    "GRAMSEVA2024",
];

/// Random officer-key alphabet. No `0 O 1 I L`.
pub const OFFICER_KEY_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Length of a generated officer key.
pub const OFFICER_KEY_LEN: usize = 8;

/// Credential salt length in bytes.
pub const SALT_LEN: usize = 16;

/// File holding salted credential digests, keyed by account id.
pub const CREDENTIALS_FILE: &str = "credentials.json";

/// File holding the officer registration key pool.
pub const OFFICER_KEYS_FILE: &str = "officer-keys.json";

/// WebSocket keep-alive ping interval.
pub const WS_PING_INTERVAL: Duration = Duration::from_secs(30);
