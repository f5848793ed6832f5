use crate::models::{AuthIntentRecord, FlowKind};
use crate::settings::IntentSettings;
use crate::storage::{KeyValueStore, StorageError};
use crate::utils::clock::Clock;
use crate::utils::logging::LoggingHelper;
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Durable intent records, one key per [`FlowKind`]
///
/// No operation fails: storage errors are logged and the store degrades to
/// "nothing pending".
pub struct IntentStore {
    storage: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    settings: IntentSettings,
    cache: Mutex<HashMap<FlowKind, CachedIntent>>,
}

/// In-process copy of a record and whether its durable write went through
#[derive(Debug, Clone, Copy)]
struct CachedIntent {
    record: AuthIntentRecord,
    durable: bool,
}

impl IntentStore {
    #[must_use]
    pub fn new(
        storage: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        settings: IntentSettings,
    ) -> Self {
        Self {
            storage,
            clock,
            settings,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<FlowKind, CachedIntent>> {
        self.cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Storage key for `kind`
    #[must_use]
    pub fn key(&self, kind: FlowKind) -> String {
        format!("{}.{}", self.settings.key_prefix, kind.key_suffix())
    }

    /// Maximum age before a record of `kind` is considered abandoned
    #[must_use]
    pub fn max_age_ms(&self, kind: FlowKind) -> i64 {
        let max_age = match kind {
            FlowKind::PopupPending => self.settings.popup_max_age_ms,
            FlowKind::RedirectPending => self.settings.redirect_max_age_ms,
        };
        i64::try_from(max_age).unwrap_or(i64::MAX)
    }

    /// Record that a flow of `kind` is starting
    ///
    /// Must be called before the operation that may destroy in-memory state.
    pub fn set_pending(&self, kind: FlowKind) {
        let record = AuthIntentRecord::new(kind, self.clock.now_millis());
        let durable = match serde_json::to_string(&record) {
            Ok(value) => match self.storage.set(&self.key(kind), &value) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Failed to persist {kind} intent record: {e}");
                    false
                }
            },
            Err(e) => {
                warn!("Failed to encode {kind} intent record: {e}");
                false
            }
        };
        self.cache().insert(kind, CachedIntent { record, durable });
        debug!("Marked {kind} flow pending at {}", record.created_at);
    }

    /// Remove the record of `kind`; clearing an absent record is a no-op
    pub fn clear_pending(&self, kind: FlowKind) {
        self.cache().remove(&kind);
        if let Err(e) = self.storage.remove(&self.key(kind)) {
            warn!("Failed to remove {kind} intent record: {e}");
        }
    }

    /// Remove every intent record (explicit user-initiated recovery)
    pub fn clear_all(&self) {
        for kind in FlowKind::ALL {
            self.clear_pending(kind);
        }
    }

    /// Whether a non-stale flow of `kind` is pending
    ///
    /// A stale record is deleted as a side effect and reported as absent.
    #[must_use]
    pub fn is_pending(&self, kind: FlowKind) -> bool {
        self.pending_record(kind).is_some()
    }

    #[must_use]
    pub fn is_any_pending(&self) -> bool {
        FlowKind::ALL.into_iter().any(|kind| self.is_pending(kind))
    }

    /// The live record of `kind`, after applying the staleness rule
    ///
    /// A persisted record is re-read so a clear made by another process is
    /// seen; the in-process copy stands in only when storage cannot be used.
    #[must_use]
    pub fn pending_record(&self, kind: FlowKind) -> Option<AuthIntentRecord> {
        let cached = self.cache().get(&kind).copied();
        let record = match cached {
            Some(entry) if !entry.durable => Some(entry.record),
            cached => match self.read_record(kind) {
                Ok(Some(record)) => Some(record),
                Ok(None) => {
                    if cached.is_some() {
                        debug!("{kind} intent record was cleared outside this process");
                        self.cache().remove(&kind);
                    }
                    None
                }
                Err(e) => {
                    warn!("Failed to read {kind} intent record: {e}");
                    cached.map(|entry| entry.record)
                }
            },
        }?;

        let now = self.clock.now_millis();
        if record.is_stale(now, self.max_age_ms(kind)) {
            LoggingHelper::log_stale_intent_purged(kind, record.age_ms(now));
            self.clear_pending(kind);
            return None;
        }
        Some(record)
    }

    /// Durable record of `kind`; malformed records are discarded and read as absent
    fn read_record(&self, kind: FlowKind) -> Result<Option<AuthIntentRecord>, StorageError> {
        let key = self.key(kind);
        let Some(raw) = self.storage.get(&key)? else {
            return Ok(None);
        };

        match serde_json::from_str::<AuthIntentRecord>(&raw) {
            Ok(record) if record.kind == kind => Ok(Some(record)),
            Ok(record) => {
                warn!(
                    "Intent record under {key} has kind {}, expected {kind}; discarding",
                    record.kind
                );
                self.clear_pending(kind);
                Ok(None)
            }
            Err(e) => {
                warn!("Discarding unreadable intent record under {key}: {e}");
                self.clear_pending(kind);
                Ok(None)
            }
        }
    }

    /// Mark `kind` pending and clear it again when the returned guard drops
    #[must_use = "dropping the guard clears the intent immediately"]
    pub fn begin(&self, kind: FlowKind) -> PendingFlowGuard<'_> {
        self.set_pending(kind);
        PendingFlowGuard { store: self, kind }
    }
}

/// Clears an intent record on every exit path, including dropped futures and panics
pub struct PendingFlowGuard<'a> {
    store: &'a IntentStore,
    kind: FlowKind,
}

impl Drop for PendingFlowGuard<'_> {
    fn drop(&mut self) {
        self.store.clear_pending(self.kind);
    }
}
