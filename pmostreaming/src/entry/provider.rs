//! Construction des entrées à partir d'une URL ou d'un chemin

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;
use url::Url;

use super::{AudioEntry, AudioEntryId};
use crate::config_ext::StreamingSettings;
use crate::error::{Error, Result};
use crate::network::NetworkingClient;
use crate::source::{AudioStreamSource, FileAudioSource, RemoteAudioSource};

/// Fabrique d'entrées partageant une session réseau.
///
/// `file://` et les chemins simples donnent une [`FileAudioSource`], toute
/// autre URL une [`RemoteAudioSource`].
#[derive(Debug, Clone)]
pub struct AudioEntryProvider {
    client: Arc<NetworkingClient>,
    settings: StreamingSettings,
}

/// Cible résolue d'une adresse d'entrée
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryLocation {
    File(PathBuf),
    Remote(Url),
}

impl EntryLocation {
    pub fn parse(address: &str) -> Result<Self> {
        match Url::parse(address) {
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .map(EntryLocation::File)
                .map_err(|_| Error::other(format!("Invalid file URL: {address}"))),
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(EntryLocation::Remote(url)),
            // Chemins Windows (`C:\...`) et schémas inconnus
            Ok(url) if url.scheme().len() == 1 => Ok(EntryLocation::File(PathBuf::from(address))),
            Ok(url) => Ok(EntryLocation::Remote(url)),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                Ok(EntryLocation::File(PathBuf::from(address)))
            }
            Err(err) => Err(err.into()),
        }
    }
}

impl AudioEntryProvider {
    pub fn new(client: Arc<NetworkingClient>, settings: StreamingSettings) -> Self {
        Self { client, settings }
    }

    /// Crée la session et la fabrique à partir des réglages
    pub fn from_settings(settings: StreamingSettings) -> Result<Self> {
        let client = Arc::new(NetworkingClient::new(&settings)?);
        Ok(Self::new(client, settings))
    }

    pub fn client(&self) -> &Arc<NetworkingClient> {
        &self.client
    }

    pub fn settings(&self) -> &StreamingSettings {
        &self.settings
    }

    /// Construit l'entrée pour `address` (URL ou chemin)
    pub async fn provide(&self, address: &str) -> Result<Arc<AudioEntry>> {
        let source: Arc<dyn AudioStreamSource> = match EntryLocation::parse(address)? {
            EntryLocation::File(path) => {
                FileAudioSource::open(&path, self.settings.file_read_chunk_size).await?
            }
            EntryLocation::Remote(url) => RemoteAudioSource::new(url, self.client.clone()),
        };
        debug!(address, source = source.id(), "Entry provided");
        Ok(AudioEntry::new(
            AudioEntryId::new(address),
            source,
            &self.settings,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_resolution() {
        assert_eq!(
            EntryLocation::parse("http://radio.example/live").unwrap(),
            EntryLocation::Remote(Url::parse("http://radio.example/live").unwrap())
        );
        assert_eq!(
            EntryLocation::parse("/music/song.ogg").unwrap(),
            EntryLocation::File(PathBuf::from("/music/song.ogg"))
        );
        assert_eq!(
            EntryLocation::parse("song.mp3").unwrap(),
            EntryLocation::File(PathBuf::from("song.mp3"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_file_url() {
        assert_eq!(
            EntryLocation::parse("file:///tmp/a%20b.flac").unwrap(),
            EntryLocation::File(PathBuf::from("/tmp/a b.flac"))
        );
    }

    #[tokio::test]
    async fn test_provide_file_entry() {
        use std::io::Write;

        let mut file = tempfile::Builder::new().suffix(".ogg").tempfile().unwrap();
        file.write_all(&[0u8; 64]).unwrap();

        let provider = AudioEntryProvider::from_settings(StreamingSettings::default()).unwrap();
        let address = file.path().to_str().unwrap().to_string();
        let entry = provider.provide(&address).await.unwrap();

        assert_eq!(entry.id().id, address);
        assert_eq!(entry.source().length(), 64);
        assert!(entry.source().audio_file_type().is_ogg());
    }
}
