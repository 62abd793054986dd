//! Événements d'entrée diffusés aux observateurs (UI, journalisation...)
//!
//! [`EntryEventRelay`] se place comme délégué d'une [`AudioEntry`](crate::AudioEntry) :
//! il publie chaque notification sur un [`Broadcaster`] puis la transmet,
//! inchangée, au délégué suivant (le décodeur) s'il y en a un.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use bytes::Bytes;
use pmoutils::{Broadcaster, Subscription};

use crate::entry::AudioEntryId;
use crate::error::Error;
use crate::source::{AudioStreamSource, AudioStreamSourceDelegate, DelegateSlot};

/// Changement d'état d'une entrée
#[derive(Debug, Clone)]
pub enum EntryEvent {
    /// Octets reçus ; `position` est la position de la source après réception
    DataReceived {
        entry: AudioEntryId,
        bytes: usize,
        position: u64,
    },
    Metadata {
        entry: AudioEntryId,
        tags: HashMap<String, String>,
    },
    EndOfFile {
        entry: AudioEntryId,
    },
    Failed {
        entry: AudioEntryId,
        error: Error,
    },
}

impl EntryEvent {
    pub fn entry(&self) -> &AudioEntryId {
        match self {
            EntryEvent::DataReceived { entry, .. }
            | EntryEvent::Metadata { entry, .. }
            | EntryEvent::EndOfFile { entry }
            | EntryEvent::Failed { entry, .. } => entry,
        }
    }
}

/// Délégué publiant les notifications d'une entrée
pub struct EntryEventRelay {
    entry: AudioEntryId,
    events: Broadcaster<EntryEvent>,
    next: DelegateSlot,
}

impl EntryEventRelay {
    pub fn new(entry: AudioEntryId, events: Broadcaster<EntryEvent>) -> Arc<Self> {
        Arc::new(Self {
            entry,
            events,
            next: DelegateSlot::default(),
        })
    }

    /// Délégué suivant (typiquement le décodeur)
    pub fn forward_to(&self, delegate: Weak<dyn AudioStreamSourceDelegate>) {
        self.next.set(delegate);
    }

    pub fn subscribe(&self) -> Subscription<EntryEvent> {
        self.events.values()
    }
}

impl AudioStreamSourceDelegate for EntryEventRelay {
    fn data_available(&self, source: &dyn AudioStreamSource, data: Bytes) {
        self.events.send(EntryEvent::DataReceived {
            entry: self.entry.clone(),
            bytes: data.len(),
            position: source.position(),
        });
        if let Some(next) = self.next.get() {
            next.data_available(source, data);
        }
    }

    fn error_occurred(&self, source: &dyn AudioStreamSource, error: Error) {
        self.events.send(EntryEvent::Failed {
            entry: self.entry.clone(),
            error: error.clone(),
        });
        if let Some(next) = self.next.get() {
            next.error_occurred(source, error);
        }
    }

    fn end_of_file_occurred(&self, source: &dyn AudioStreamSource) {
        self.events.send(EntryEvent::EndOfFile {
            entry: self.entry.clone(),
        });
        if let Some(next) = self.next.get() {
            next.end_of_file_occurred(source);
        }
    }

    fn metadata_received(&self, metadata: HashMap<String, String>) {
        self.events.send(EntryEvent::Metadata {
            entry: self.entry.clone(),
            tags: metadata.clone(),
        });
        if let Some(next) = self.next.get() {
            next.metadata_received(metadata);
        }
    }

    fn position_reset(&self, source: &dyn AudioStreamSource) {
        if let Some(next) = self.next.get() {
            next.position_reset(source);
        }
    }
}
