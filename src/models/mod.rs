//! Data models for keepr.
//!
//! [`Memory`] is the normalized view model the engine holds; [`MemoryRecord`]
//! is what the service puts on the wire; [`NewMemory`] and [`UnlockAttempt`]
//! are the outbound requests.

mod memory;
mod record;
mod request;

pub use memory::{AccessState, Memory, MemoryId, Owner, RevealedKeyword};
pub use record::{MemoryRecord, WireId, WireOwner, normalize_records};
pub use request::{MAX_TITLE_LEN, NewMemory, UnlockAttempt};
pub(crate) use record::parse_created_at;
