//! Integration tests for the `streamres` binary.
//!
//! Covers top-level flags, subcommand help, and end-to-end runs of each
//! subcommand against the fixtures in `tests/fixtures`. No test touches
//! the network: on-demand resolves use a local player script.

#![allow(deprecated)] // cargo_bin deprecation, replacement not yet stable

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Helper: get a Command for the `streamres` binary.
fn streamres() -> Command {
    Command::cargo_bin("streamres").expect("binary 'streamres' should be built")
}

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"))
}

/// Point `--config` at a file that does not exist so the user's own
/// config never leaks into a test.
fn no_config(dir: &TempDir) -> String {
    dir.path().join("config.toml").display().to_string()
}

// ─── Top-level flags ─────────────────────────────────────────────────────────

#[test]
fn help_flag_shows_usage() {
    streamres()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: streamres"))
        .stdout(predicate::str::contains("resolve"))
        .stdout(predicate::str::contains("decode"))
        .stdout(predicate::str::contains("inspect-manifest"));
}

#[test]
fn version_flag_shows_semver() {
    streamres()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^streamres \d+\.\d+\.\d+\n$").unwrap());
}

#[test]
fn no_args_shows_error_and_usage() {
    streamres()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage: streamres"));
}

#[test]
fn invalid_subcommand_fails() {
    streamres()
        .arg("this-is-not-a-real-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

// ─── Subcommand help ─────────────────────────────────────────────────────────

#[test]
fn resolve_help() {
    streamres()
        .args(["resolve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("<METADATA>"))
        .stdout(predicate::str::contains("--audio"))
        .stdout(predicate::str::contains("--player-script"));
}

#[test]
fn decode_missing_player_script_fails() {
    streamres()
        .args(["decode", "https://cdn.example.com/v?n=abc"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--player-script"));
}

#[test]
fn inspect_manifest_missing_base_url_fails() {
    streamres()
        .args(["inspect-manifest", &fixture("inline.mpd")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--base-url"));
}

// ─── resolve ─────────────────────────────────────────────────────────────────

#[test]
fn resolve_live_uses_hls_when_dash_is_empty() {
    let dir = TempDir::new().unwrap();
    streamres()
        .args(["--config", &no_config(&dir), "resolve", &fixture("live.json")])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""protocol": "hls""#))
        .stdout(predicate::str::contains("index.m3u8"))
        .stdout(predicate::str::contains(r#""live_edge_offset_ms": 10000"#))
        .stdout(predicate::str::contains(r#""min_retries": 5"#))
        .stdout(predicate::str::contains(r#""throttled": false"#));
}

#[test]
fn resolve_on_demand_video_picks_best_progressive() {
    let dir = TempDir::new().unwrap();
    streamres()
        .args([
            "--config",
            &no_config(&dir),
            "resolve",
            &fixture("on_demand.json"),
            "--player-script",
            &fixture("player.js"),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("itag=22&n=3Bz1qT8fXk"))
        .stdout(predicate::str::contains(r#""kind": "unlimited""#))
        .stdout(predicate::str::contains(r#""rendition_index": 1"#))
        .stdout(predicate::str::contains("vod00000001 720p mp4"));
}

#[test]
fn resolve_on_demand_audio_flag() {
    let dir = TempDir::new().unwrap();
    streamres()
        .args([
            "--config",
            &no_config(&dir),
            "resolve",
            "--audio",
            &fixture("on_demand.json"),
            "--player-script",
            &fixture("player.js"),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("itag=140&n=3Bz1qT8fXk&sig=A"))
        .stdout(predicate::str::contains("128kbps m4a"));
}

#[test]
fn resolve_respects_configured_height_limit() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "[video]\nmax_height = 480\n").unwrap();

    streamres()
        .args([
            "--config",
            &config.display().to_string(),
            "resolve",
            &fixture("on_demand.json"),
            "--player-script",
            &fixture("player.js"),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("itag=18&n=cedfba"))
        .stdout(predicate::str::contains(r#""rendition_index": 0"#));
}

#[test]
fn resolve_without_renditions_fails() {
    let dir = TempDir::new().unwrap();
    let metadata = dir.path().join("empty.json");
    std::fs::write(&metadata, r#"{"id": "x", "stream_type": "video_stream"}"#).unwrap();

    streamres()
        .args([
            "--config",
            &no_config(&dir),
            "resolve",
            &metadata.display().to_string(),
            "--player-script",
            &fixture("player.js"),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no playable rendition"));
}

#[test]
fn resolve_on_demand_reports_decoder_init_failure() {
    let dir = TempDir::new().unwrap();
    let script = dir.path().join("base.js");
    std::fs::write(&script, "var nothing = 1;").unwrap();

    streamres()
        .args([
            "--config",
            &no_config(&dir),
            "resolve",
            &fixture("on_demand.json"),
            "--player-script",
            &script.display().to_string(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to initialize throttling decoder"));
}

#[test]
fn resolve_live_skips_decoder_init() {
    let dir = TempDir::new().unwrap();
    streamres()
        .args([
            "--config",
            &no_config(&dir),
            "resolve",
            &fixture("live.json"),
            "--player-script",
            "/nonexistent/base.js",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""protocol": "hls""#));
}

#[test]
fn resolve_rejects_inline_dash_without_base_url() {
    let dir = TempDir::new().unwrap();
    let metadata = dir.path().join("inline.json");
    std::fs::write(
        &metadata,
        r#"{"id": "x", "stream_type": "audio_stream", "audio_renditions": [{
            "protocol": "dash",
            "content": {"type": "manifest", "value": "<MPD/>"},
            "format": "m4a",
            "quality": {"kind": "audio", "bitrate_kbps": 128}
        }]}"#,
    )
    .unwrap();

    streamres()
        .args([
            "--config",
            &no_config(&dir),
            "resolve",
            &metadata.display().to_string(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid stream metadata"));
}

#[test]
fn resolve_missing_file_fails() {
    streamres()
        .args(["resolve", "/nonexistent/metadata.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read"));
}

// ─── decode ──────────────────────────────────────────────────────────────────

#[test]
fn decode_rewrites_challenge() {
    streamres()
        .args([
            "decode",
            "https://cdn.example.com/videoplayback?n=abcdef&itag=18",
            "--player-script",
            &fixture("player.js"),
        ])
        .assert()
        .success()
        .stdout("https://cdn.example.com/videoplayback?n=cedfba&itag=18\n");
}

#[test]
fn decode_without_challenge_is_identity() {
    streamres()
        .args([
            "decode",
            "https://cdn.example.com/videoplayback?itag=18",
            "--player-script",
            &fixture("player.js"),
        ])
        .assert()
        .success()
        .stdout("https://cdn.example.com/videoplayback?itag=18\n");
}

#[test]
fn decode_with_unusable_script_fails() {
    let dir = TempDir::new().unwrap();
    let script = dir.path().join("base.js");
    std::fs::write(&script, "var nothing = 1;").unwrap();

    streamres()
        .args([
            "decode",
            "https://cdn.example.com/v?n=abcdef",
            "--player-script",
            &script.display().to_string(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("call site not found"));
}

// ─── inspect-manifest ────────────────────────────────────────────────────────

#[test]
fn inspect_manifest_prints_table() {
    streamres()
        .args([
            "inspect-manifest",
            &fixture("inline.mpd"),
            "--base-url",
            "https://rr1.example.com/",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Static presentation, duration 60.5s"))
        .stdout(predicate::str::contains("1280x720"))
        .stdout(predicate::str::contains("44100Hz"))
        .stdout(predicate::str::contains(
            "https://rr1.example.com/videoplayback/itag/140?n=abcdef",
        ))
        .stdout(predicate::str::contains("(2 representations)"));
}

#[test]
fn inspect_manifest_json() {
    streamres()
        .args([
            "inspect-manifest",
            &fixture("inline.mpd"),
            "--base-url",
            "https://rr1.example.com/",
            "--json",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""presentation": "static""#))
        .stdout(predicate::str::contains(r#""bandwidth": 1100000"#));
}

#[test]
fn inspect_manifest_reports_parse_errors() {
    let dir = TempDir::new().unwrap();
    let mpd = dir.path().join("bad.mpd");
    std::fs::write(&mpd, r#"<MPD type="static"><Period/></MPD>"#).unwrap();

    streamres()
        .args([
            "inspect-manifest",
            &mpd.display().to_string(),
            "--base-url",
            "https://rr1.example.com/",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("mediaPresentationDuration"));
}
