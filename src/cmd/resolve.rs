use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use streamres::config::{config_path, ResolverConfig};
use streamres::throttling::{FilePlayerScript, HttpPlayerScript, PlayerScriptSource};
use streamres::{Resolver, ResolverMode, StreamMetadata, ThrottlingDecoder};

pub fn cmd_resolve(
    metadata_path: &Path,
    audio: bool,
    player_script: Option<&Path>,
    config: Option<&Path>,
) -> Result<()> {
    let config_file = config.map_or_else(config_path, Path::to_path_buf);
    let config = ResolverConfig::load_from(&config_file)?;

    let text = std::fs::read_to_string(metadata_path)
        .with_context(|| format!("failed to read {}", metadata_path.display()))?;
    let metadata: StreamMetadata = serde_json::from_str(&text)
        .with_context(|| format!("invalid stream metadata in {}", metadata_path.display()))?;

    // Live items never touch the decoder, so only on-demand items pay for the fetch
    let source: Arc<dyn PlayerScriptSource> =
        match player_script.or(config.player_script.as_deref()) {
            Some(path) => Arc::new(FilePlayerScript::new(path)),
            None => Arc::new(HttpPlayerScript::new()?),
        };
    let decoder = Arc::new(ThrottlingDecoder::new(config.bootstrap_id.clone(), source));
    if !metadata.stream_type.is_live() {
        decoder
            .init()
            .context("failed to initialize throttling decoder")?;
    }

    let mode = if audio {
        ResolverMode::Audio
    } else {
        ResolverMode::Video
    };
    let resolver = Resolver::new(mode, decoder);

    let transport = resolver
        .resolve(&Arc::new(metadata), &config.capabilities())
        .context("resolve failed")?;

    println!("{}", serde_json::to_string_pretty(&transport.summary())?);
    Ok(())
}
