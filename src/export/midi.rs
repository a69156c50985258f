// MIDI Export - Convert transcriptions to MIDI files using midly crate
// One melodic track: notes plus pitch bend automation on a single channel

use midly::{
    Format, Header, MetaMessage, MidiMessage, PitchBend, Smf, Timing, Track, TrackEvent,
    TrackEventKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::Transcription;

#[derive(Debug, Error)]
pub enum MidiExportError {
    #[error("Invalid export options: {0}")]
    InvalidOptions(String),

    #[error("Failed to write MIDI: {0}")]
    Write(String),
}

/// MIDI export options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiExportOptions {
    /// Pulses per quarter note (PPQ)
    pub ppq: u16,

    /// Tempo written to the file; only affects how seconds map to ticks
    pub bpm: f64,

    /// General MIDI program (0-based; 24 = nylon guitar)
    pub program: u8,

    /// MIDI channel (0-15)
    pub channel: u8,

    pub track_name: Option<String>,

    /// Pitch bend sensitivity announced via RPN 0, in semitones
    ///
    /// Set this to the transcription's bend range so a synth renders the
    /// bends at the intended depth. `None` writes no RPN.
    pub bend_range_semitones: Option<f64>,
}

impl Default for MidiExportOptions {
    fn default() -> Self {
        MidiExportOptions {
            ppq: 480,
            bpm: 120.0,
            program: 24,
            channel: 0,
            track_name: None,
            bend_range_semitones: Some(2.0),
        }
    }
}

impl MidiExportOptions {
    fn validate(&self) -> Result<(), MidiExportError> {
        if self.ppq == 0 || self.ppq > 0x7FFF {
            return Err(MidiExportError::InvalidOptions(format!(
                "ppq must be within 1..=32767, got {}",
                self.ppq
            )));
        }
        if !self.bpm.is_finite() || self.bpm <= 0.0 {
            return Err(MidiExportError::InvalidOptions(format!(
                "bpm must be positive, got {}",
                self.bpm
            )));
        }
        if self.program > 127 {
            return Err(MidiExportError::InvalidOptions(format!(
                "program must be within 0..=127, got {}",
                self.program
            )));
        }
        if self.channel > 15 {
            return Err(MidiExportError::InvalidOptions(format!(
                "channel must be within 0..=15, got {}",
                self.channel
            )));
        }
        if let Some(range) = self.bend_range_semitones {
            if !range.is_finite() || range <= 0.0 || range >= 128.0 {
                return Err(MidiExportError::InvalidOptions(format!(
                    "bend range must be within (0, 128) semitones, got {}",
                    range
                )));
            }
        }
        Ok(())
    }
}

/// Order of simultaneous events: release, retune, then strike
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum EventOrder {
    Setup,
    NoteOff,
    Bend,
    NoteOn,
}

/// Export a transcription to Standard MIDI File bytes
pub fn export_midi(
    transcription: &Transcription,
    options: &MidiExportOptions,
) -> Result<Vec<u8>, MidiExportError> {
    options.validate()?;

    let header = Header {
        format: Format::SingleTrack,
        timing: Timing::Metrical(options.ppq.into()),
    };

    let ticks_per_second = calculate_ticks_per_second(options.bpm, options.ppq);
    let track = create_note_track(transcription, ticks_per_second, options);

    let smf = Smf {
        header,
        tracks: vec![track],
    };

    let mut bytes = Vec::new();
    smf.write(&mut bytes)
        .map_err(|e| MidiExportError::Write(e.to_string()))?;

    Ok(bytes)
}

fn create_note_track<'a>(
    transcription: &Transcription,
    ticks_per_second: f64,
    options: &'a MidiExportOptions,
) -> Track<'a> {
    let channel = options.channel.into();
    let mut events: Vec<(u32, EventOrder, TrackEventKind<'a>)> = Vec::new();

    if let Some(name) = &options.track_name {
        events.push((
            0,
            EventOrder::Setup,
            TrackEventKind::Meta(MetaMessage::TrackName(name.as_bytes())),
        ));
    }

    events.push((
        0,
        EventOrder::Setup,
        TrackEventKind::Meta(MetaMessage::Tempo(tempo_micros(options.bpm).into())),
    ));

    events.push((
        0,
        EventOrder::Setup,
        TrackEventKind::Midi {
            channel,
            message: MidiMessage::ProgramChange {
                program: options.program.into(),
            },
        },
    ));

    if let Some(range) = options.bend_range_semitones {
        for (controller, value) in bend_range_rpn(range) {
            events.push((
                0,
                EventOrder::Setup,
                TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::Controller {
                        controller: controller.into(),
                        value: value.into(),
                    },
                },
            ));
        }
    }

    for note in &transcription.notes {
        let tick_on = seconds_to_ticks(note.start_time, ticks_per_second);
        let tick_off = seconds_to_ticks(note.end_time, ticks_per_second).max(tick_on + 1);

        events.push((
            tick_on,
            EventOrder::NoteOn,
            TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOn {
                    key: note.pitch.into(),
                    vel: note.velocity.into(),
                },
            },
        ));
        events.push((
            tick_off,
            EventOrder::NoteOff,
            TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOff {
                    key: note.pitch.into(),
                    vel: 0.into(),
                },
            },
        ));
    }

    for bend in &transcription.pitch_bends {
        events.push((
            seconds_to_ticks(bend.time, ticks_per_second),
            EventOrder::Bend,
            TrackEventKind::Midi {
                channel,
                message: MidiMessage::PitchBend {
                    bend: PitchBend::from_int(bend.value),
                },
            },
        ));
    }

    // Stable sort keeps bends of one note in emission order
    events.sort_by_key(|(tick, order, _)| (*tick, *order));

    let mut track = Track::new();
    let mut last_tick = 0;
    for (tick, _, kind) in events {
        track.push(TrackEvent {
            delta: tick.saturating_sub(last_tick).into(),
            kind,
        });
        last_tick = tick;
    }

    track.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    track
}

/// Ticks per second at a fixed tempo
fn calculate_ticks_per_second(bpm: f64, ppq: u16) -> f64 {
    ppq as f64 * bpm / 60.0
}

fn seconds_to_ticks(seconds: f64, ticks_per_second: f64) -> u32 {
    (seconds.max(0.0) * ticks_per_second).round() as u32
}

/// Microseconds per quarter note, limited to the 24-bit tempo field
fn tempo_micros(bpm: f64) -> u32 {
    ((60_000_000.0 / bpm) as u32).min(0xFF_FFFF)
}

/// RPN 0 (pitch bend sensitivity): select, set semitones and cents, deselect
fn bend_range_rpn(range: f64) -> [(u8, u8); 6] {
    let semitones = range.trunc() as u8;
    let cents = ((range - range.trunc()) * 100.0).round().min(99.0) as u8;
    [
        (101, 0),
        (100, 0),
        (6, semitones),
        (38, cents),
        (101, 127),
        (100, 127),
    ]
}
