//! Search sessions
//!
//! A [`SearchSession`] holds one search's value type, compare mode,
//! candidate addresses and the values observed at them. Sessions are fully
//! independent; the [`SessionRegistry`] only exists so that all of them can
//! be found and cancelled at once.

pub mod cancel;
pub mod registry;
pub mod search;

pub use cancel::CancellationToken;
pub use registry::SessionRegistry;
pub use search::{ScanClaim, SearchSession, SessionPhase, SessionSnapshot, SnapshotEntry};
