//! Shared API key slot.

use std::fmt;
use std::sync::{Arc, RwLock};

/// Environment variables checked for an initial key, in order.
const KEY_ENV_VARS: &[&str] = &["GEMINI_API_KEY", "API_KEY"];

/// The currently selected API key, shared between the client and whatever
/// component lets the user pick a new one.
///
/// The client reads the slot on every request, so a key stored after a
/// credential reselection is used by the next call.
#[derive(Clone, Default)]
pub struct ApiKeyStore {
    inner: Arc<RwLock<Option<String>>>,
}

impl ApiKeyStore {
    pub fn new(key: Option<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(key.filter(|k| !k.trim().is_empty()))),
        }
    }

    /// Seed the store from `GEMINI_API_KEY` or `API_KEY`.
    pub fn from_env() -> Self {
        let key = KEY_ENV_VARS
            .iter()
            .find_map(|name| std::env::var(name).ok())
            .filter(|k| !k.trim().is_empty());
        Self::new(key)
    }

    pub fn get(&self) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Replace the key. Blank keys are ignored and return `false`.
    pub fn set(&self, key: impl Into<String>) -> bool {
        let key = key.into();
        let key = key.trim();
        if key.is_empty() {
            return false;
        }
        *self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(key.to_string());
        true
    }

    pub fn clear(&self) {
        *self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }

    pub fn is_set(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }
}

impl fmt::Debug for ApiKeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeyStore")
            .field("is_set", &self.is_set())
            .finish()
    }
}
