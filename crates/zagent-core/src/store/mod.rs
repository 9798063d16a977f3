//! On-disk snapshots of command results and the ticket read cache.
//!
//! Layout under the store root:
//!
//! ```text
//! tickets/<id>/latest.json
//! tickets/<id>/snapshots/YYYY/MM/DD/HHMMSS.json
//! queues/<slug>/latest.json
//! queues/<slug>/snapshots/YYYY/MM/DD/HHMMSS.json
//! searches/<slug>/latest.json
//! searches/<slug>/YYYY/MM/DD/HHMMSS.json
//! ```

mod cache;
mod writer;

pub use cache::TicketCache;
pub use writer::{Persisted, SnapshotWriter};
