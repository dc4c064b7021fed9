use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use streamres::throttling::{FilePlayerScript, DEFAULT_BOOTSTRAP_ID};
use streamres::ThrottlingDecoder;

pub fn cmd_decode(url: &str, player_script: &Path) -> Result<()> {
    let decoder = ThrottlingDecoder::new(
        DEFAULT_BOOTSTRAP_ID,
        Arc::new(FilePlayerScript::new(player_script)),
    );
    println!("{}", decoder.decode(url)?);
    Ok(())
}
