//! Entrées audio : modèle de progression, de débit et de seek

pub mod audio_entry;
pub mod id;
pub mod provider;
pub mod state;

pub use audio_entry::AudioEntry;
pub use id::AudioEntryId;
pub use provider::{AudioEntryProvider, EntryLocation};
pub use state::{
    AudioStreamState, EntryFramesState, ProcessedPacketsState, SeekRequest, StreamFormat,
};
