// Export module
// MIDI file and JSON report output

pub mod midi;
pub mod report;

pub use midi::{export_midi, MidiExportError, MidiExportOptions};
pub use report::{write_report, TranscriptionReport};
