//! Credential selection.

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::{info, warn};

use dream_veo_client::ApiKeyStore;

use crate::error::{WorkerError, WorkerResult};

/// Lets the user pick or replace the credential used for generation.
#[async_trait]
pub trait CredentialSelector: Send + Sync {
    /// Whether a credential is currently selected.
    fn has_credential(&self) -> bool;

    /// Ask the user for a credential. Returns once a choice was made or the
    /// prompt was dismissed.
    async fn open_selector(&self) -> WorkerResult<()>;
}

type KeyInput = Box<dyn AsyncBufRead + Send + Unpin>;

/// Reads a replacement API key from standard input.
///
/// Concurrent callers share one prompt: whoever waits behind an in-progress
/// prompt returns as soon as the key changed. One buffered reader lives as
/// long as the selector, so input typed ahead is kept for the next prompt.
pub struct InteractiveKeySelector {
    keys: ApiKeyStore,
    input: Mutex<KeyInput>,
}

impl InteractiveKeySelector {
    pub fn new(keys: ApiKeyStore) -> Self {
        Self::with_input(keys, BufReader::new(tokio::io::stdin()))
    }

    /// Read keys from `input` instead of standard input.
    pub fn with_input(keys: ApiKeyStore, input: impl AsyncBufRead + Send + Unpin + 'static) -> Self {
        Self {
            keys,
            input: Mutex::new(Box::new(input)),
        }
    }

    pub fn keys(&self) -> &ApiKeyStore {
        &self.keys
    }
}

#[async_trait]
impl CredentialSelector for InteractiveKeySelector {
    fn has_credential(&self) -> bool {
        self.keys.is_set()
    }

    async fn open_selector(&self) -> WorkerResult<()> {
        let before = self.keys.get();
        let mut input = self.input.lock().await;
        if self.keys.get() != before {
            return Ok(());
        }

        let mut stderr = tokio::io::stderr();
        stderr
            .write_all(b"Enter a Gemini API key with Veo access (empty to skip): ")
            .await?;
        stderr.flush().await?;

        let mut line = String::new();
        let read = input.read_line(&mut line).await?;
        if read == 0 {
            return Err(WorkerError::credential("standard input closed"));
        }

        if self.keys.set(line) {
            info!("API key updated");
        } else {
            warn!("No API key entered, keeping the previous selection");
        }
        Ok(())
    }
}

impl std::fmt::Debug for InteractiveKeySelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractiveKeySelector")
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}
