//! Compiled throttling transform and URL rewriting.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};

use regex::Regex;
use tracing::{debug, warn};

use super::engine::TransformEngine;
use super::{extract, InitError};

/// The obfuscated challenge lives in the `n` query parameter.
static CHALLENGE_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[&?]n=([^&#]+)").expect("valid challenge regex"));

/// Prefix the player returns instead of throwing when the transform fails.
const EXCEPTION_MARKER: &str = "enhanced_except_";

/// Challenge used to check a freshly compiled transform actually runs.
const PROBE_CHALLENGE: &str = "O1ZqcwzGhvA5bL";

/// Decoded challenges kept per state. The cache is emptied when full.
const DECODE_CACHE_LIMIT: usize = 256;

/// Immutable compiled transform, shared by every resolver in the process.
pub struct ThrottlingState {
    function_name: String,
    engine: TransformEngine,
    // Challenge -> decoded value. Segment requests repeat the same `n`.
    decoded: Mutex<HashMap<String, String>>,
}

impl std::fmt::Debug for ThrottlingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThrottlingState")
            .field("function_name", &self.function_name)
            .finish_non_exhaustive()
    }
}

impl ThrottlingState {
    /// Compile the transform found in `player_script`.
    pub fn compile(player_script: &str) -> Result<Self, InitError> {
        let function_name = extract::function_name(player_script)?;
        let source = extract::function_source(player_script, &function_name)?;
        let engine =
            TransformEngine::compile(&source).map_err(|e| InitError::Compile(e.to_string()))?;

        let probe = engine
            .call(PROBE_CHALLENGE)
            .map_err(|e| InitError::Compile(e.to_string()))?;
        if probe.starts_with(EXCEPTION_MARKER) {
            return Err(InitError::Compile(format!(
                "transform `{function_name}` rejected probe challenge"
            )));
        }

        debug!("Compiled throttling transform `{function_name}`");
        Ok(Self {
            function_name,
            engine,
            decoded: Mutex::new(HashMap::new()),
        })
    }

    #[must_use]
    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    /// Extract the raw challenge value from `url`, if present.
    #[must_use]
    pub fn challenge(url: &str) -> Option<&str> {
        CHALLENGE_PARAM
            .captures(url)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }

    /// Run the transform on one challenge value.
    ///
    /// Returns `None` when the transform throws or reports its own failure.
    pub fn decode_challenge(&self, challenge: &str) -> Option<String> {
        if let Some(hit) = self.cached(challenge) {
            return Some(hit);
        }

        let decoded = match self.engine.call(challenge) {
            Ok(decoded) if !decoded.is_empty() && !decoded.starts_with(EXCEPTION_MARKER) => decoded,
            Ok(decoded) => {
                debug!("Transform rejected challenge {challenge}: {decoded}");
                return None;
            }
            Err(e) => {
                debug!("Transform failed for challenge {challenge}: {e}");
                return None;
            }
        };

        if let Ok(mut cache) = self.decoded.lock() {
            if cache.len() >= DECODE_CACHE_LIMIT {
                cache.clear();
            }
            cache.insert(challenge.to_string(), decoded.clone());
        }
        Some(decoded)
    }

    /// Replace the challenge in `url` with its decoded form.
    ///
    /// Only the parameter value changes; every other byte is kept. URLs
    /// without a challenge, or whose challenge cannot be decoded, come back
    /// untouched.
    pub fn decode<'a>(&self, url: &'a str) -> Cow<'a, str> {
        let Some(value) = CHALLENGE_PARAM.captures(url).and_then(|caps| caps.get(1)) else {
            return Cow::Borrowed(url);
        };

        match self.decode_challenge(value.as_str()) {
            Some(decoded) => {
                let mut out = String::with_capacity(url.len() - value.len() + decoded.len());
                out.push_str(&url[..value.start()]);
                out.push_str(&decoded);
                out.push_str(&url[value.end()..]);
                Cow::Owned(out)
            }
            None => {
                warn!("Throttling parameter left as-is for {}", redact(url));
                Cow::Borrowed(url)
            }
        }
    }

    fn cached(&self, challenge: &str) -> Option<String> {
        self.decoded
            .lock()
            .ok()
            .and_then(|cache| cache.get(challenge).cloned())
    }
}

/// Scheme and host only; media URLs carry signatures.
fn redact(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| format!("{}://{h}/…", u.scheme())))
        .unwrap_or_else(|| "<invalid url>".to_string())
}
