use std::path::Path;

use anyhow::{Context, Result};

use streamres::manifest::{self, ManifestModel};

pub fn cmd_inspect_manifest(file: &Path, base_url: &str, json: bool) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let model = manifest::parse(&text, base_url)
        .with_context(|| format!("error when parsing {}", file.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&model)?);
    } else {
        print_table(&model);
    }
    Ok(())
}

fn print_table(model: &ManifestModel) {
    let duration = model
        .duration
        .map_or_else(|| "-".to_string(), |d| format!("{:.1}s", d.as_secs_f64()));
    println!("{:?} presentation, duration {duration}", model.presentation);

    println!(
        "{:<8} {:>10} {:<12} {:<18} {:>9}  {}",
        "ID", "BANDWIDTH", "MIME", "CODECS", "SIZE", "URL"
    );
    for rep in model.representations() {
        let size = match (rep.width, rep.height) {
            (Some(w), Some(h)) => format!("{w}x{h}"),
            (None, Some(h)) => format!("{h}p"),
            _ => rep
                .audio_sampling_rate
                .map_or_else(|| "-".to_string(), |hz| format!("{hz}Hz")),
        };
        println!(
            "{:<8} {:>10} {:<12} {:<18} {:>9}  {}",
            rep.id,
            rep.bandwidth,
            rep.mime_type.as_deref().unwrap_or("-"),
            rep.codecs.as_deref().unwrap_or("-"),
            size,
            rep.base_url
        );
    }
    println!("\n({} representations)", model.representations().count());
}
