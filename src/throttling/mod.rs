//! Throttling parameter decoder
//!
//! The origin rewrites the `n` query parameter of media URLs with an
//! obfuscated challenge; requests that carry the raw challenge are served
//! at a crawl. The player script contains the function that maps the
//! challenge back to its cleartext value.
//!
//! - [`ThrottlingState`]: one compiled transform, immutable once built.
//! - [`ThrottlingDecoder`]: process-scoped holder. [`ThrottlingDecoder::init`]
//!   fetches and compiles the state exactly once; afterwards
//!   [`ThrottlingDecoder::state`] hands the same instance to every caller
//!   without blocking.
//!
//! Decoding never fails: a URL without a challenge, or one the transform
//! rejects, is returned unchanged. Only initialization can fail, and that
//! failure is reported to the resolver as a hard error.

mod engine;
mod extract;
pub mod source;
mod state;

use std::borrow::Cow;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing::info;

pub use source::{FilePlayerScript, HttpPlayerScript, PlayerScriptSource, StaticPlayerScript};
pub use state::ThrottlingState;

/// Video id whose embed page is used to locate the current player script.
pub const DEFAULT_BOOTSTRAP_ID: &str = "dbevJM-2lc";

/// Errors deriving the transform. Fatal for every throttled rendition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InitError {
    #[error("player script unavailable: {0}")]
    Source(String),

    #[error("throttling transform call site not found in player script")]
    FunctionNotFound,

    #[error("could not extract body of throttling function `{0}`")]
    FunctionBody(String),

    #[error("throttling transform failed to compile: {0}")]
    Compile(String),

    #[error("throttling decoder has not been initialized")]
    NotInitialized,
}

/// Explicitly initialized, process-scoped throttling transform.
///
/// Construct one per process, call [`init`](Self::init) once, and share it
/// (behind an [`Arc`]) with every resolver. Concurrent callers of `init`
/// block on a single compilation and all observe the same
/// [`ThrottlingState`].
pub struct ThrottlingDecoder {
    bootstrap_id: String,
    source: Arc<dyn PlayerScriptSource>,
    cell: RwLock<Arc<OnceCell<Arc<ThrottlingState>>>>,
    last_error: Mutex<Option<InitError>>,
}

impl ThrottlingDecoder {
    pub fn new(bootstrap_id: impl Into<String>, source: Arc<dyn PlayerScriptSource>) -> Self {
        Self {
            bootstrap_id: bootstrap_id.into(),
            source,
            cell: RwLock::new(Arc::new(OnceCell::new())),
            last_error: Mutex::new(None),
        }
    }

    /// Decoder over an in-memory player script.
    pub fn from_script(script: impl Into<String>) -> Self {
        Self::new(
            DEFAULT_BOOTSTRAP_ID,
            Arc::new(StaticPlayerScript(script.into())),
        )
    }

    #[must_use]
    pub fn bootstrap_id(&self) -> &str {
        &self.bootstrap_id
    }

    /// Fetch the player script and compile the transform.
    ///
    /// Blocking: may go to the network through the script source. Call it
    /// once before resolving on-demand items. Concurrent callers wait on a
    /// single compilation and all get the same state. A failed compilation
    /// is not cached: the error goes to the caller and the next call tries
    /// again.
    pub fn init(&self) -> Result<Arc<ThrottlingState>, InitError> {
        let cell = Arc::clone(&self.cell.read().unwrap_or_else(PoisonError::into_inner));

        let result = cell
            .get_or_try_init(|| {
                info!("Initializing throttling decoder from {}", self.bootstrap_id);
                let script = self.source.player_script(&self.bootstrap_id)?;
                ThrottlingState::compile(&script).map(Arc::new)
            })
            .cloned();

        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) =
            result.as_ref().err().cloned();
        result
    }

    /// The compiled transform, if [`init`](Self::init) has succeeded.
    ///
    /// Never blocks on the script source. Before a successful init this
    /// returns the error of the last failed attempt, or
    /// [`InitError::NotInitialized`] if none was made.
    pub fn state(&self) -> Result<Arc<ThrottlingState>, InitError> {
        if let Some(state) = self.cell.read().unwrap_or_else(PoisonError::into_inner).get() {
            return Ok(Arc::clone(state));
        }
        Err(self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or(InitError::NotInitialized))
    }

    /// Returns `true` once a compiled state is available.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.cell
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get()
            .is_some()
    }

    /// Decode the challenge in `url`, initializing first if needed.
    pub fn decode<'a>(&self, url: &'a str) -> Result<Cow<'a, str>, InitError> {
        Ok(self.init()?.decode(url))
    }

    /// Drop the compiled state; the next [`init`](Self::init) recompiles.
    ///
    /// Callers already holding an `Arc<ThrottlingState>` keep using it.
    pub fn reset(&self) {
        *self.cell.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(OnceCell::new());
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl std::fmt::Debug for ThrottlingDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThrottlingDecoder")
            .field("bootstrap_id", &self.bootstrap_id)
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}
