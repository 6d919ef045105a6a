//! Authentication module for the client-side session.
//!
//! This module provides:
//! - `SessionStore`: the token lifecycle (hydrate, sign in, sign out)
//! - `TokenSlot`: durable storage for the credential (file, keychain, memory)
//! - `decode_identity`: reads the `{ id, email }` claims out of a token
//!
//! Persisted tokens expire after 7 days.

pub mod keychain;
pub mod slot;
pub mod store;
pub mod token;

pub use keychain::KeyringSlot;
pub use slot::{FileSlot, MemorySlot, SlotError, SlotOptions, StoredToken, TokenSlot};
pub use store::{SessionStore, SessionView};
pub use token::{decode_identity, DecodeError, Identity};
