//! Durable storage for the session credential.
//!
//! A slot holds exactly one record: the raw token, when it expires, and whether
//! it may only travel over secure transport. A record past its expiry reads as
//! absent and is removed on the way out.

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Name of the slot entry (file stem, keychain account).
pub const TOKEN_KEY: &str = "auth-token";

/// Days a persisted credential survives without a new sign-in.
pub const TOKEN_EXPIRY_DAYS: i64 = 7;

#[derive(Error, Debug)]
pub enum SlotError {
    #[error("Token storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Token record is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Keychain access failed: {0}")]
    Keyring(#[from] keyring::Error),
}

/// Attributes written alongside the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotOptions {
    pub expires_in: Duration,
    pub secure: bool,
}

impl SlotOptions {
    /// Options used for every sign-in.
    pub fn session() -> Self {
        Self {
            expires_in: Duration::days(TOKEN_EXPIRY_DAYS),
            secure: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub secure: bool,
}

impl StoredToken {
    pub fn new(token: &str, options: SlotOptions) -> Self {
        Self {
            token: token.to_string(),
            expires_at: Utc::now() + options.expires_in,
            secure: options.secure,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// A named, durable key-value entry holding one credential.
///
/// Only the session store reads or writes a slot.
pub trait TokenSlot: Send + Sync {
    /// Read the stored record, if any. Expired records are returned as-is;
    /// use [`TokenSlot::read`] for expiry-aware access.
    fn load(&self) -> Result<Option<StoredToken>, SlotError>;

    fn store(&self, record: &StoredToken) -> Result<(), SlotError>;

    /// Remove the record. Removing an absent record succeeds.
    fn erase(&self) -> Result<(), SlotError>;

    /// Read the live credential, dropping it if it has expired.
    fn read(&self) -> Result<Option<String>, SlotError> {
        match self.load()? {
            Some(record) if record.is_expired() => {
                debug!(expired_at = %record.expires_at, "Stored token expired");
                self.erase()?;
                Ok(None)
            }
            Some(record) => Ok(Some(record.token)),
            None => Ok(None),
        }
    }

    fn write(&self, token: &str, options: SlotOptions) -> Result<(), SlotError> {
        self.store(&StoredToken::new(token, options))
    }
}

/// Slot backed by a JSON file in the user's cache directory.
pub struct FileSlot {
    path: PathBuf,
}

impl FileSlot {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            path: dir.join(format!("{}.json", TOKEN_KEY)),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl TokenSlot for FileSlot {
    fn load(&self) -> Result<Option<StoredToken>, SlotError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    fn store(&self, record: &StoredToken) -> Result<(), SlotError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(record)?;
        std::fs::write(&self.path, contents)?;
        restrict_permissions(&self.path)?;
        Ok(())
    }

    fn erase(&self) -> Result<(), SlotError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &std::path::Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &std::path::Path) -> std::io::Result<()> {
    Ok(())
}

/// Slot that lives only as long as the process.
#[derive(Default)]
pub struct MemorySlot {
    record: Mutex<Option<StoredToken>>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the slot with a record, as if written by an earlier run.
    pub fn with_record(record: StoredToken) -> Self {
        Self {
            record: Mutex::new(Some(record)),
        }
    }
}

impl TokenSlot for MemorySlot {
    fn load(&self) -> Result<Option<StoredToken>, SlotError> {
        Ok(self.record.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn store(&self, record: &StoredToken) -> Result<(), SlotError> {
        *self.record.lock().unwrap_or_else(PoisonError::into_inner) = Some(record.clone());
        Ok(())
    }

    fn erase(&self) -> Result<(), SlotError> {
        *self.record.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

impl<S: TokenSlot + ?Sized> TokenSlot for std::sync::Arc<S> {
    fn load(&self) -> Result<Option<StoredToken>, SlotError> {
        (**self).load()
    }

    fn store(&self, record: &StoredToken) -> Result<(), SlotError> {
        (**self).store(record)
    }

    fn erase(&self) -> Result<(), SlotError> {
        (**self).erase()
    }
}

impl<S: TokenSlot + ?Sized> TokenSlot for Box<S> {
    fn load(&self) -> Result<Option<StoredToken>, SlotError> {
        (**self).load()
    }

    fn store(&self, record: &StoredToken) -> Result<(), SlotError> {
        (**self).store(record)
    }

    fn erase(&self) -> Result<(), SlotError> {
        (**self).erase()
    }
}
