use keyring::Entry;

use super::slot::{SlotError, StoredToken, TokenSlot, TOKEN_KEY};

const SERVICE_NAME: &str = "resep";

/// Slot backed by the OS keychain. The record is stored as JSON in the
/// entry's password field.
pub struct KeyringSlot {
    entry: Entry,
}

impl KeyringSlot {
    pub fn new() -> Result<Self, SlotError> {
        Ok(Self {
            entry: Entry::new(SERVICE_NAME, TOKEN_KEY)?,
        })
    }
}

impl TokenSlot for KeyringSlot {
    fn load(&self) -> Result<Option<StoredToken>, SlotError> {
        match self.entry.get_password() {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, record: &StoredToken) -> Result<(), SlotError> {
        let json = serde_json::to_string(record)?;
        self.entry.set_password(&json)?;
        Ok(())
    }

    fn erase(&self) -> Result<(), SlotError> {
        match self.entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
