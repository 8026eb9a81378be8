//! Admin session token held in session-scoped storage.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::storage::{read_string, KeyValueStore, StorageError, ADMIN_EXPIRY_KEY, ADMIN_SESSION_KEY};

pub const DEFAULT_SESSION_MINUTES: i64 = 60;
/// Longest session lifetime accepted: one week.
pub const MAX_SESSION_MINUTES: i64 = 7 * 24 * 60;

#[derive(Debug)]
pub struct AdminSession<S> {
    store: S,
    lifetime: Duration,
}

impl<S: KeyValueStore> AdminSession<S> {
    pub fn new(store: S) -> Self {
        Self::with_lifetime(store, Duration::minutes(DEFAULT_SESSION_MINUTES))
    }

    /// `lifetime` is clamped to `MAX_SESSION_MINUTES`.
    pub fn with_lifetime(store: S, lifetime: Duration) -> Self {
        let lifetime = lifetime.min(Duration::minutes(MAX_SESSION_MINUTES));
        Self { store, lifetime }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    /// Start a session and return its token.
    pub fn create(&mut self, now: DateTime<Utc>) -> Result<String, StorageError> {
        let token = Uuid::new_v4().to_string();
        self.store.set(ADMIN_SESSION_KEY, &token)?;
        self.write_expiry(now)?;
        info!("Admin session started");
        Ok(token)
    }

    /// A session is valid while a token exists and `now` is not past expiry.
    /// Expired sessions are cleared as a side effect.
    pub fn is_valid(&mut self, now: DateTime<Utc>) -> bool {
        let token = read_string(&self.store, ADMIN_SESSION_KEY);
        let expiry = read_string(&self.store, ADMIN_EXPIRY_KEY)
            .and_then(|raw| raw.trim().parse::<i64>().ok());
        let (Some(_), Some(expiry)) = (token, expiry) else {
            return false;
        };

        if now.timestamp_millis() > expiry {
            debug!("Admin session expired");
            if let Err(e) = self.clear() {
                warn!("Could not clear expired session: {e}");
            }
            return false;
        }
        true
    }

    /// Push the expiry out by one lifetime. Returns `false` when there is no
    /// valid session to extend.
    pub fn extend(&mut self, now: DateTime<Utc>) -> Result<bool, StorageError> {
        if !self.is_valid(now) {
            return Ok(false);
        }
        self.write_expiry(now)?;
        Ok(true)
    }

    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.store.remove(ADMIN_SESSION_KEY)?;
        self.store.remove(ADMIN_EXPIRY_KEY)
    }

    fn write_expiry(&mut self, now: DateTime<Utc>) -> Result<(), StorageError> {
        let expiry = now
            .checked_add_signed(self.lifetime)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
            .timestamp_millis();
        self.store.set(ADMIN_EXPIRY_KEY, &expiry.to_string())
    }
}
