//! Memory access-control engine.
//!
//! The engine owns the client-observed lifecycle of every memory in the
//! current collection:
//!
//! ```text
//! ┌────────┐  attempt_unlock (accepted)  ┌──────────┐
//! │ Locked │ ──────────────────────────► │ Unlocked │
//! └────────┘                             └──────────┘
//! ```
//!
//! There is no way back. Rejections leave the collection untouched.
//!
//! Every [`AccessControlEngine::load_collection`] call takes a ticket from a
//! [`LoadSequencer`]. A response is applied only if its ticket is newer than
//! anything already applied, so the last-issued load wins no matter the order
//! responses arrive in. An accepted unlock fences every ticket issued before
//! it, so a load that was in flight during the unlock cannot put the memory
//! back into `Locked`. Later loads cannot either: the collection remembers
//! every accepted unlock and carries it over stale service data.

mod collection;
mod fallback;
mod sequence;

pub use fallback::placeholder_collection;
pub use sequence::LoadSequencer;

use crate::models::{
    AccessState, Memory, MemoryId, NewMemory, RevealedKeyword, UnlockAttempt, normalize_records,
};
use crate::observability::{
    METRIC_COLLECTION_LOADS, METRIC_SERVICE_LATENCY_MS, METRIC_UNLOCK_ATTEMPTS,
    in_correlation_scope,
};
use crate::remote::{CollectionScope, MemoryService, UnlockAcceptance};
use crate::session::SessionContext;
use crate::{Error, Result};
use collection::MemoryCollection;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Where the current collection came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Provenance {
    /// Nothing has been loaded yet.
    #[default]
    Empty,
    /// Data returned by the memory service.
    Authoritative,
    /// The built-in placeholder collection.
    Placeholder,
}

impl Provenance {
    /// Returns the provenance as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Authoritative => "authoritative",
            Self::Placeholder => "placeholder",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// View ordering for [`AccessControlEngine::sorted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// The order the service returned.
    #[default]
    ServerOrder,
    /// Most recent `created_at` first.
    NewestFirst,
    /// Oldest `created_at` first.
    OldestFirst,
}

impl SortOrder {
    /// Parses a sort name. Unknown values fall back to server order.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "newest" | "recent" | "newest-first" => Self::NewestFirst,
            "oldest" | "date" | "oldest-first" => Self::OldestFirst,
            _ => Self::ServerOrder,
        }
    }
}

/// Outcome of [`AccessControlEngine::load_collection`].
#[derive(Debug)]
pub enum CollectionLoad {
    /// The service answered; the collection was replaced with its data.
    Fresh(Vec<Memory>),
    /// The service failed; the collection now holds placeholder data.
    Degraded {
        /// The placeholder memories.
        memories: Vec<Memory>,
        /// Why the service call failed.
        reason: Error,
    },
    /// A newer load was applied first; this response was discarded.
    Superseded {
        /// The collection as it stands.
        current: Vec<Memory>,
    },
    /// The post-unlock refresh failed; the service data already held was kept.
    Retained {
        /// The collection as it stands.
        current: Vec<Memory>,
        /// Why the service call failed.
        reason: Error,
    },
}

impl CollectionLoad {
    /// The memories this outcome carries.
    #[must_use]
    pub fn memories(&self) -> &[Memory] {
        match self {
            Self::Fresh(memories)
            | Self::Degraded { memories, .. }
            | Self::Superseded { current: memories }
            | Self::Retained {
                current: memories, ..
            } => memories,
        }
    }

    /// Consumes the outcome, returning its memories.
    #[must_use]
    pub fn into_memories(self) -> Vec<Memory> {
        match self {
            Self::Fresh(memories)
            | Self::Degraded { memories, .. }
            | Self::Superseded { current: memories }
            | Self::Retained {
                current: memories, ..
            } => memories,
        }
    }

    /// The service error behind a degraded or retained outcome.
    #[must_use]
    pub const fn failure(&self) -> Option<&Error> {
        match self {
            Self::Degraded { reason, .. } | Self::Retained { reason, .. } => Some(reason),
            Self::Fresh(_) | Self::Superseded { .. } => None,
        }
    }

    /// True if this call's data came from the service.
    #[must_use]
    pub const fn is_authoritative(&self) -> bool {
        matches!(self, Self::Fresh(_))
    }

    /// True if this call fell back to placeholder data.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    /// True if a failed refresh kept the existing service data.
    #[must_use]
    pub const fn is_retained(&self) -> bool {
        matches!(self, Self::Retained { .. })
    }

    /// True if this call's response was discarded as stale.
    #[must_use]
    pub const fn is_superseded(&self) -> bool {
        matches!(self, Self::Superseded { .. })
    }

    const fn outcome(&self) -> &'static str {
        match self {
            Self::Fresh(_) => "fresh",
            Self::Degraded { .. } => "degraded",
            Self::Superseded { .. } => "superseded",
            Self::Retained { .. } => "retained",
        }
    }
}

/// Result of an accepted unlock.
#[derive(Debug)]
pub struct UnlockReceipt {
    /// The memory that was unlocked.
    pub memory_id: MemoryId,
    /// False if a concurrent attempt had already unlocked it.
    pub transitioned: bool,
    /// The memory right after the transition, before the refresh.
    pub memory: Option<Memory>,
    /// Informational message from the service.
    pub message: Option<String>,
    /// Outcome of the refresh that follows every accepted unlock. A failed
    /// refresh is [`CollectionLoad::Retained`] rather than a fallback.
    pub refresh: CollectionLoad,
}

/// Client-side owner of memory visibility state.
pub struct AccessControlEngine {
    service: Arc<dyn MemoryService>,
    session: Arc<SessionContext>,
    scope: CollectionScope,
    sequencer: LoadSequencer,
    state: Mutex<MemoryCollection>,
}

impl AccessControlEngine {
    /// Creates an engine with an empty collection.
    #[must_use]
    pub fn new(
        service: Arc<dyn MemoryService>,
        session: Arc<SessionContext>,
        scope: CollectionScope,
    ) -> Self {
        Self {
            service,
            session,
            scope,
            sequencer: LoadSequencer::new(),
            state: Mutex::new(MemoryCollection::default()),
        }
    }

    /// The collection scope this engine loads.
    #[must_use]
    pub const fn scope(&self) -> CollectionScope {
        self.scope
    }

    /// Fetches the viewer's collection and replaces the local one.
    ///
    /// Never fails: service errors yield [`CollectionLoad::Degraded`] with
    /// the placeholder collection, and stale responses yield
    /// [`CollectionLoad::Superseded`].
    pub async fn load_collection(&self) -> CollectionLoad {
        in_correlation_scope(self.load_sequenced(false)).await
    }

    /// Runs one sequenced load. With `retain_on_failure`, a service error
    /// keeps an authoritative collection in place instead of falling back.
    async fn load_sequenced(&self, retain_on_failure: bool) -> CollectionLoad {
        let ticket = self.sequencer.issue();
        let credential = self.session.credential();

        let start = Instant::now();
        let fetched = self
            .service
            .fetch_collection(self.scope, credential.as_ref())
            .await
            .map(normalize_records);
        record_latency("fetch_collection", start);

        let mut state = self.lock_state();
        if !state.accepts(ticket) {
            tracing::debug!(ticket, "Discarding stale collection response");
            let load = CollectionLoad::Superseded {
                current: state.memories().to_vec(),
            };
            drop(state);
            metrics::counter!(METRIC_COLLECTION_LOADS, "outcome" => load.outcome()).increment(1);
            return load;
        }

        let load = match fetched {
            Ok(memories) => {
                state.replace(memories, Provenance::Authoritative, ticket);
                tracing::info!(
                    ticket,
                    scope = %self.scope,
                    count = state.memories().len(),
                    "Loaded memory collection"
                );
                CollectionLoad::Fresh(state.memories().to_vec())
            },
            Err(reason)
                if retain_on_failure && state.provenance() == Provenance::Authoritative =>
            {
                state.fence(ticket);
                tracing::warn!(
                    ticket,
                    service = self.service.name(),
                    error = %reason,
                    error_kind = reason.kind(),
                    "Refresh failed, keeping current collection"
                );
                CollectionLoad::Retained {
                    current: state.memories().to_vec(),
                    reason,
                }
            },
            Err(reason) => {
                state.replace(placeholder_collection(), Provenance::Placeholder, ticket);
                tracing::warn!(
                    ticket,
                    service = self.service.name(),
                    error = %reason,
                    error_kind = reason.kind(),
                    "Memory service unavailable, showing placeholder collection"
                );
                CollectionLoad::Degraded {
                    memories: state.memories().to_vec(),
                    reason,
                }
            },
        };
        drop(state);

        metrics::counter!(METRIC_COLLECTION_LOADS, "outcome" => load.outcome()).increment(1);
        load
    }

    /// Tries to unlock one memory with `keyword`.
    ///
    /// The keyword is submitted exactly as entered. On acceptance the memory
    /// moves to `Unlocked` and the collection is refreshed.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] if the keyword is blank (no network call)
    /// - [`Error::PreconditionFailed`] if the memory is not in the current
    ///   collection, is already unlocked, or the collection is placeholder
    ///   data (no network call)
    /// - [`Error::Rejected`] with the service's message verbatim
    /// - [`Error::Unavailable`] on transport failure or a malformed response
    ///
    /// The collection is untouched on every error path.
    pub async fn attempt_unlock(&self, memory_id: &MemoryId, keyword: &str) -> Result<UnlockReceipt> {
        in_correlation_scope(self.unlock_and_refresh(memory_id, keyword)).await
    }

    async fn unlock_and_refresh(&self, memory_id: &MemoryId, keyword: &str) -> Result<UnlockReceipt> {
        let attempt = UnlockAttempt::new(memory_id.clone(), keyword, self.session.credential())
            .and_then(|attempt| {
                self.check_unlockable(memory_id)?;
                Ok(attempt)
            })
            .inspect_err(|e| {
                tracing::debug!(memory_id = %memory_id, error = %e, "Unlock attempt refused locally");
                metrics::counter!(METRIC_UNLOCK_ATTEMPTS, "outcome" => e.kind()).increment(1);
            })?;

        let start = Instant::now();
        let submitted = self.service.submit_unlock(&attempt).await;
        record_latency("submit_unlock", start);
        drop(attempt);

        let acceptance = submitted.inspect_err(|e| {
            tracing::info!(
                memory_id = %memory_id,
                error_kind = e.kind(),
                "Unlock attempt not accepted"
            );
            metrics::counter!(METRIC_UNLOCK_ATTEMPTS, "outcome" => e.kind()).increment(1);
        })?;

        let (transitioned, memory) = self.apply_unlock(memory_id, &acceptance);
        metrics::counter!(METRIC_UNLOCK_ATTEMPTS, "outcome" => "accepted").increment(1);
        tracing::info!(memory_id = %memory_id, transitioned, "Memory unlocked");

        let refresh = self.load_sequenced(true).await;

        Ok(UnlockReceipt {
            memory_id: memory_id.clone(),
            transitioned,
            memory,
            message: acceptance.message,
            refresh,
        })
    }

    fn check_unlockable(&self, memory_id: &MemoryId) -> Result<()> {
        let state = self.lock_state();
        if state.provenance() == Provenance::Placeholder {
            return Err(Error::PreconditionFailed(
                "placeholder memories cannot be unlocked while the service is unavailable"
                    .to_string(),
            ));
        }
        match state.get(memory_id) {
            None => Err(Error::PreconditionFailed(format!(
                "memory {memory_id} is not in the current collection"
            ))),
            Some(memory) if !memory.is_locked() => Err(Error::PreconditionFailed(format!(
                "memory {memory_id} is already unlocked"
            ))),
            Some(_) => Ok(()),
        }
    }

    /// Marks the memory unlocked, records the unlock for later loads, and
    /// fences loads issued before acceptance.
    fn apply_unlock(
        &self,
        memory_id: &MemoryId,
        acceptance: &UnlockAcceptance,
    ) -> (bool, Option<Memory>) {
        let returned = acceptance
            .record
            .clone()
            .and_then(|record| {
                Memory::try_from(record)
                    .inspect_err(|e| tracing::debug!(error = %e, "Ignoring malformed unlock record"))
                    .ok()
            })
            .filter(|m| &m.id == memory_id);

        let mut state = self.lock_state();
        state.fence(self.sequencer.latest());
        state.record_unlock(memory_id, None);

        let Some(memory) = state.get_mut(memory_id) else {
            tracing::warn!(memory_id = %memory_id, "Unlocked memory left the collection before the update");
            return (false, None);
        };

        let revealed = match returned {
            Some(updated) => {
                if !updated.title.trim().is_empty() {
                    memory.title = updated.title;
                }
                if !updated.description.is_empty() {
                    memory.description = updated.description;
                }
                if updated.image_url.is_some() {
                    memory.image_url = updated.image_url;
                }
                match updated.access_state {
                    AccessState::Unlocked { revealed_keyword } => revealed_keyword,
                    AccessState::Locked => None,
                }
            },
            None => None,
        };
        let transitioned = memory.unlock(revealed);
        let memory = memory.clone();
        state.record_unlock(
            memory_id,
            memory.revealed_keyword().and_then(RevealedKeyword::new),
        );
        (transitioned, Some(memory))
    }

    /// Case-insensitive substring match over title and description.
    ///
    /// Pure and synchronous; an empty query returns the whole collection in
    /// order.
    #[must_use]
    pub fn filter(&self, query: &str) -> Vec<Memory> {
        self.lock_state().filter(query)
    }

    /// Looks up one memory.
    #[must_use]
    pub fn get(&self, memory_id: &MemoryId) -> Option<Memory> {
        self.lock_state().get(memory_id).cloned()
    }

    /// The current collection, in server order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Memory> {
        self.lock_state().memories().to_vec()
    }

    /// Where the current collection came from.
    #[must_use]
    pub fn provenance(&self) -> Provenance {
        self.lock_state().provenance()
    }

    /// The current collection in the requested order.
    #[must_use]
    pub fn sorted(&self, order: SortOrder) -> Vec<Memory> {
        self.lock_state().sorted(order)
    }

    /// Validates and submits a new memory, returning the id the service
    /// assigned.
    ///
    /// The local collection is not touched; the memory shows up on the next
    /// load.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] for a blank title or keyword or a bad image
    /// URL, otherwise the service's [`Error::Rejected`] or
    /// [`Error::Unavailable`].
    pub async fn create_memory(&self, memory: NewMemory) -> Result<MemoryId> {
        in_correlation_scope(async move {
            memory.validate()?;
            let credential = self.session.credential();

            let start = Instant::now();
            let created = self.service.create_memory(&memory, credential.as_ref()).await;
            record_latency("create_memory", start);
            drop(memory);

            let id = created.inspect_err(|e| {
                tracing::warn!(error = %e, error_kind = e.kind(), "Memory creation failed");
            })?;
            tracing::info!(memory_id = %id, "Memory created");
            Ok(id)
        })
        .await
    }

    fn lock_state(&self) -> MutexGuard<'_, MemoryCollection> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn record_latency(operation: &'static str, start: Instant) {
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    metrics::histogram!(METRIC_SERVICE_LATENCY_MS, "operation" => operation).record(elapsed_ms);
}
