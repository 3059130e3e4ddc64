//! GramSeva client library
//!
//! Offline-tolerant client for the GramSeva server: an in-memory store of
//! every collection, reconciled against the server by full-collection pushes
//! and realtime broadcasts, with a local cache for when the server is away.
//!
//! ```text
//!   Portal action ──▶ ClientStore::update ──▶ SyncEngine::push ──▶ POST /api/{c}
//!                          ▲                        │ unreachable
//!                          │                        ▼
//!        apply_remote ◀── pump ◀── RealtimeClient   LocalStore (GRAMSEVA_<C>)
//! ```
//!
//! |--------------------|---------------------------------------------------|
//! | Type               | Purpose                                           |
//! |--------------------|---------------------------------------------------|
//! | [`Portal`]         | Domain actions for residents, officers, developers|
//! | [`ClientStore`]    | Per-collection values, sync state, change events  |
//! | [`SyncEngine`]     | Fetch, deduplicated push, local fallback, resync  |
//! | [`SessionResolver`]| Session snapshot, login, registration             |
//! | [`RealtimeClient`] | Websocket listener with reconnect backoff         |
//! | [`LocalStore`]     | File-backed key-value cache                       |
//! |--------------------|---------------------------------------------------|

pub mod config;
pub mod constants;
pub mod local;
pub mod portal;
pub mod realtime;
pub mod remote;
pub mod session;
pub mod store;
pub mod sync;

pub use config::ClientConfig;
pub use local::{LocalStore, LocalStoreError};
pub use portal::{ActionError, BusinessListing, Portal};
pub use realtime::{ConnectionStatus, RealtimeClient, ReconnectPolicy, ServerEvent};
pub use remote::{HttpRemote, Remote, RemoteError};
pub use session::{SessionError, SessionResolver, search_officers};
pub use store::{ClientStore, Origin, StoreEvent, SyncState};
pub use sync::{PushOutcome, SyncEngine};
