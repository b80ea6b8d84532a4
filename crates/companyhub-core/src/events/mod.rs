//! Mutation events exchanged between replicas through the shared event log.
//!
//! - [`MutationEvent`] - a typed company mutation (UPDATE or DELETE)
//! - [`RawEvent`] - the wire form stored in the log (`id`, `action`, `name`)
//! - [`Cursor`] - an ordered position in the log
//! - [`LogEntry`] - a raw event together with the cursor it was stored at

mod cursor;
mod types;

pub use cursor::{Cursor, StartPosition};
pub use types::{LogEntry, MutationAction, MutationEvent, RawEvent};
