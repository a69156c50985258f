mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cli::Cli;
use portamento_lib::config::{load_config, TranscriptionConfig};
use portamento_lib::export::{export_midi, write_report, MidiExportOptions, TranscriptionReport};
use portamento_lib::input::read_frame_track;
use portamento_lib::jobs::JobQueue;
use portamento_lib::pipeline::{TraceBuilder, TraceStage, TraceWriter, Transcriber, Transcription};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    let base = match find_config_path(cli.config.as_deref()) {
        Some(path) if cli.config.is_some() => load_config(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        Some(path) => match load_config(&path) {
            Ok(config) => {
                log::info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                log::warn!("Ignoring config {}: {}", path.display(), e);
                TranscriptionConfig::default()
            }
        },
        None => TranscriptionConfig::default(),
    };
    let config = cli.apply_overrides(&base);

    if cli.print_config {
        print!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    if cli.output.is_some() && cli.inputs.len() > 1 {
        anyhow::bail!("--output can only be used with a single input");
    }

    let transcriber = Transcriber::new(config).context("Invalid transcription settings")?;
    let export_options = MidiExportOptions {
        ppq: cli.ppq,
        program: cli.program,
        bend_range_semitones: Some(transcriber.config().pitch_bend_range),
        ..Default::default()
    };

    let trace = cli
        .trace
        .as_ref()
        .map(|path| Arc::new(TraceWriter::new(path.clone())));
    let mut queue = JobQueue::new(transcriber);
    if let Some(writer) = &trace {
        queue = queue.with_trace(Arc::clone(writer));
    }

    log::info!("portamento - pitch track to MIDI");

    let mut failed = 0usize;
    let mut submitted = Vec::new();
    for input in &cli.inputs {
        match read_frame_track(input) {
            Ok(track) => {
                log::info!(
                    "Input: {} ({} frames, {:.2}s)",
                    input.display(),
                    track.len(),
                    track.duration_secs()
                );
                submitted.push((input.clone(), queue.submit(source_name(input), track)));
            }
            Err(e) => {
                log::error!("Failed to load {}: {}", input.display(), e);
                failed += 1;
            }
        }
    }

    for (input, id) in submitted {
        let record = queue.wait(id).await?;
        let transcription = match queue.result(id) {
            Ok(transcription) => transcription,
            Err(e) => {
                log::error!("{}: {}", input.display(), e);
                failed += 1;
                if let Err(e) = queue.remove(id) {
                    log::warn!("Failed to release job {}: {}", id, e);
                }
                continue;
            }
        };

        let track_name = input
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned());
        let options = MidiExportOptions {
            track_name,
            ..export_options.clone()
        };

        match write_outputs(&cli, &input, &transcription, &options) {
            Ok(midi_path) => {
                log::info!(
                    "{} -> {} ({} notes, {} pitch bends)",
                    input.display(),
                    midi_path.display(),
                    transcription.notes.len(),
                    transcription.pitch_bends.len()
                );
                if let Some(writer) = &trace {
                    let entry = TraceBuilder::new(&record.source).with_data(
                        TraceStage::Export,
                        1.0,
                        format!("Wrote {}", midi_path.display()),
                        serde_json::json!({ "job_id": record.id, "path": midi_path }),
                    );
                    if let Err(e) = writer.write(&entry) {
                        log::warn!("Failed to write trace entry: {}", e);
                    }
                }
            }
            Err(e) => {
                log::error!("{}: {:#}", input.display(), e);
                failed += 1;
            }
        }

        if let Err(e) = queue.remove(id) {
            log::warn!("Failed to release job {}: {}", id, e);
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} inputs failed", failed, cli.inputs.len());
    }

    Ok(())
}

/// Explicit --config path, or auto-detect portamento.toml / global config
fn find_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    let local = PathBuf::from("portamento.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("portamento").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("portamento").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

fn source_name(input: &Path) -> String {
    input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.display().to_string())
}

/// `<out_dir or input dir>/<input stem><suffix>`
fn sibling_path(cli: &Cli, input: &Path, suffix: &str) -> PathBuf {
    let dir = cli
        .out_dir
        .clone()
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    dir.join(format!("{}{}", stem, suffix))
}

fn write_outputs(
    cli: &Cli,
    input: &Path,
    transcription: &Transcription,
    options: &MidiExportOptions,
) -> Result<PathBuf> {
    let midi_path = cli
        .output
        .clone()
        .unwrap_or_else(|| sibling_path(cli, input, ".mid"));

    if let Some(parent) = midi_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let bytes = export_midi(transcription, options).context("MIDI export failed")?;
    std::fs::write(&midi_path, bytes)
        .with_context(|| format!("Failed to write {}", midi_path.display()))?;

    if cli.report {
        let report_path = sibling_path(cli, input, ".report.json");
        let report = TranscriptionReport::new(transcription, Some(source_name(input)));
        write_report(&report_path, &report)
            .with_context(|| format!("Failed to write {}", report_path.display()))?;
        log::info!("Report: {}", report_path.display());
    }

    Ok(midi_path)
}
