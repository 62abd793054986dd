//! # pmostreaming
//!
//! Livraison incrémentale de flux audio réseau (HTTP, Icecast/Shoutcast) et
//! locaux, avec suivi de la progression de lecture.
//!
//! # Features
//!
//! - **Session réseau** : [`NetworkingClient`] multiplexe les tâches HTTP vers
//!   des flux logiques ([`NetworkDataStream`]) via un dispatcher unique
//! - **Sources** : [`RemoteAudioSource`] (requêtes `Range`, métadonnées ICY
//!   entrelacées) et [`FileAudioSource`]
//! - **Parseurs** : en-têtes HTTP et ICY, blocs `StreamTitle='...';`,
//!   pages Ogg et en-têtes Vorbis
//! - **Entrées** : [`AudioEntry`] suit paquets, trames, seeks versionnés et
//!   estime débit et durée
//! - **Événements** : [`EntryEventRelay`] publie les notifications d'une
//!   entrée sur un [`pmoutils::Broadcaster`]
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use pmostreaming::{AudioEntryProvider, EntryEvent, EntryEventRelay, StreamingSettings};
//! use pmoutils::Broadcaster;
//!
//! # #[tokio::main]
//! # async fn main() -> pmostreaming::Result<()> {
//! let provider = AudioEntryProvider::from_settings(StreamingSettings::default())?;
//! let entry = provider.provide("http://radio.example/live.ogg").await?;
//!
//! let relay = EntryEventRelay::new(entry.id().clone(), Broadcaster::new());
//! let mut events = relay.subscribe();
//! let delegate: Arc<dyn pmostreaming::AudioStreamSourceDelegate> = relay.clone();
//! entry.set_delegate(Arc::downgrade(&delegate));
//! entry.open();
//!
//! while let Some(event) = events.next().await {
//!     if let EntryEvent::Metadata { tags, .. } = event {
//!         println!("{tags:?}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Extension
//!
//! Les réglages sont lus dans la configuration `pmoconfig` sous la clé
//! `streaming` (voir [`StreamingConfigExt`]) :
//!
//! ```no_run
//! use pmoconfig::get_config;
//! use pmostreaming::{StreamingConfigExt, StreamingSettings};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = get_config();
//! config.set_streaming_connect_timeout_secs(5)?;
//! let settings = StreamingSettings::from_config(&config)?;
//! # Ok(())
//! # }
//! ```

pub mod config_ext;
pub mod entry;
pub mod error;
pub mod events;
pub mod network;
pub mod ogg;
pub mod parsers;
pub mod source;

pub use config_ext::{StreamingConfigExt, StreamingSettings};
pub use entry::{AudioEntry, AudioEntryId, AudioEntryProvider, EntryLocation};
pub use error::{Error, NetworkError, Result};
pub use events::{EntryEvent, EntryEventRelay};
pub use network::{
    NetworkDataStream, NetworkingClient, ResponseInfo, StreamEvent, StreamId, StreamRequest,
    TaskId,
};
pub use ogg::{FieldOutOfRange, OggVorbisState, OggVorbisStreamData, OggVorbisStreamInfo};
pub use parsers::{AudioFileType, HeaderParserOutput, Parser, StreamMetadata};
pub use source::{
    AudioStreamSource, AudioStreamSourceDelegate, FileAudioSource, RemoteAudioSource,
};
