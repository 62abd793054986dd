//! Sources de données audio et leur délégué
//!
//! Une source livre des octets compressés à son délégué au fur et à mesure
//! de leur arrivée. Les sources démarrent au premier [`seek`](AudioStreamSource::seek)
//! et redémarrent depuis la nouvelle position à chaque seek suivant.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use bytes::Bytes;
use pmoutils::Guarded;

use crate::error::Error;
use crate::parsers::AudioFileType;

pub mod file;
pub mod icy_processor;
pub mod metadata_stream;
pub mod remote;

pub use file::FileAudioSource;
pub use icy_processor::{IcyHeadersProcessor, IcyProcessing};
pub use metadata_stream::{MetadataStreamItem, MetadataStreamProcessor};
pub use remote::RemoteAudioSource;

/// Récepteur des notifications d'une source (décodeur, entrée, relais)
pub trait AudioStreamSourceDelegate: Send + Sync {
    fn data_available(&self, source: &dyn AudioStreamSource, data: Bytes);

    fn error_occurred(&self, source: &dyn AudioStreamSource, error: Error);

    fn end_of_file_occurred(&self, source: &dyn AudioStreamSource);

    fn metadata_received(&self, metadata: HashMap<String, String>);

    /// La source repart de l'octet 0 au lieu de la position demandée
    /// (serveur ignorant `Range`)
    fn position_reset(&self, _source: &dyn AudioStreamSource) {}
}

/// Source d'octets audio compressés
pub trait AudioStreamSource: Send + Sync {
    /// URL ou chemin de la source
    fn id(&self) -> &str;

    fn set_delegate(&self, delegate: Weak<dyn AudioStreamSourceDelegate>);

    fn remove_delegate(&self);

    /// Position (octets) du prochain octet livré
    fn position(&self) -> u64;

    /// Longueur totale en octets (0 = inconnue)
    fn length(&self) -> u64;

    fn supports_seek(&self) -> bool;

    /// Démarre ou redémarre la livraison à partir de `offset`
    fn seek(&self, offset: u64);

    fn close(&self);

    fn audio_file_type(&self) -> AudioFileType;
}

/// Emplacement du délégué d'une source (référence faible)
#[derive(Default)]
pub(crate) struct DelegateSlot {
    delegate: Guarded<Option<Weak<dyn AudioStreamSourceDelegate>>>,
}

impl DelegateSlot {
    pub(crate) fn set(&self, delegate: Weak<dyn AudioStreamSourceDelegate>) {
        self.delegate.replace(Some(delegate));
    }

    pub(crate) fn clear(&self) {
        self.delegate.replace(None);
    }

    /// Délégué courant, s'il est encore vivant
    pub(crate) fn get(&self) -> Option<Arc<dyn AudioStreamSourceDelegate>> {
        self.delegate.read(|delegate| delegate.as_ref().and_then(Weak::upgrade))
    }
}
