//! Where the obfuscated player script comes from.

use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, info};

use super::InitError;

const EMBED_BASE: &str = "https://www.youtube.com/embed";
const ORIGIN: &str = "https://www.youtube.com";

static PLAYER_URL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#""jsUrl"\s*:\s*"([^"]+base\.js)""#,
        r#"<script[^>]+src="([^"]+/base\.js)""#,
        r#"(/s/player/[A-Za-z0-9_-]+/[^"'\s]*base\.js)"#,
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Supplies the player script a transform is compiled from.
///
/// Implementations may be expensive (network, disk); the decoder calls
/// them at most once per successful initialization.
pub trait PlayerScriptSource: Send + Sync {
    fn player_script(&self, bootstrap_id: &str) -> Result<String, InitError>;
}

/// Player script already held in memory.
#[derive(Debug, Clone)]
pub struct StaticPlayerScript(pub String);

impl PlayerScriptSource for StaticPlayerScript {
    fn player_script(&self, _bootstrap_id: &str) -> Result<String, InitError> {
        Ok(self.0.clone())
    }
}

/// Player script read from a local file (a pre-fetched `base.js`).
#[derive(Debug, Clone)]
pub struct FilePlayerScript {
    path: PathBuf,
}

impl FilePlayerScript {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PlayerScriptSource for FilePlayerScript {
    fn player_script(&self, _bootstrap_id: &str) -> Result<String, InitError> {
        std::fs::read_to_string(&self.path)
            .map_err(|e| InitError::Source(format!("{}: {e}", self.path.display())))
    }
}

/// Fetches the player script referenced by the embed page of the
/// bootstrap video.
pub struct HttpPlayerScript {
    client: reqwest::blocking::Client,
    max_retries: u32,
}

impl HttpPlayerScript {
    pub fn new() -> Result<Self, InitError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(20))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:128.0) Gecko/20100101 Firefox/128.0")
            .build()
            .map_err(|e| InitError::Source(e.to_string()))?;

        Ok(Self {
            client,
            max_retries: 3,
        })
    }

    fn fetch_with_retry(&self, url: &str) -> Result<String, InitError> {
        let mut last_error = None;

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                let delay_ms = 50 * (4_u64.pow(attempt - 1)); // 50, 200ms
                std::thread::sleep(Duration::from_millis(delay_ms));
            }

            match self.client.get(url).send() {
                Ok(resp) => match resp.error_for_status() {
                    Ok(resp) => match resp.text() {
                        Ok(body) => return Ok(body),
                        Err(e) => last_error = Some(format!("body read error: {e}")),
                    },
                    Err(e) => last_error = Some(format!("HTTP error: {e}")),
                },
                Err(e) => last_error = Some(format!("network error: {e}")),
            }
        }

        Err(InitError::Source(
            last_error.unwrap_or_else(|| format!("no attempts made for {url}")),
        ))
    }
}

impl PlayerScriptSource for HttpPlayerScript {
    fn player_script(&self, bootstrap_id: &str) -> Result<String, InitError> {
        let embed_url = format!("{EMBED_BASE}/{bootstrap_id}");
        debug!("Fetching embed page {embed_url}");
        let page = self.fetch_with_retry(&embed_url)?;

        let player_url = player_url_from_page(&page).ok_or_else(|| {
            InitError::Source(format!("no player script referenced by {embed_url}"))
        })?;
        info!("Fetching player script {player_url}");
        self.fetch_with_retry(&player_url)
    }
}

/// Find the player script URL in an embed page, made absolute.
fn player_url_from_page(page: &str) -> Option<String> {
    let raw = PLAYER_URL_PATTERNS
        .iter()
        .find_map(|re| re.captures(page).map(|caps| caps[1].replace("\\/", "/")))?;

    if raw.starts_with("//") {
        Some(format!("https:{raw}"))
    } else if raw.starts_with('/') {
        Some(format!("{ORIGIN}{raw}"))
    } else {
        Some(raw)
    }
}
