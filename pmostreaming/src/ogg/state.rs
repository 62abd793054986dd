//! État Ogg Vorbis d'une entrée : bufferisation des premiers octets jusqu'à
//! l'obtention des en-têtes, puis extension continue de la table de seek.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::{OggPageReader, OggVorbisHeaderParser, OggVorbisStreamInfo, Parser};

/// Limite de bufferisation des en-têtes
pub const DEFAULT_MAX_HEADER_BYTES: usize = 64 * 1024;

#[derive(Debug)]
pub struct OggVorbisState {
    info: Option<OggVorbisStreamInfo>,
    comments: HashMap<String, String>,
    parse_attempted: bool,
    pending: Vec<u8>,
    reader: Option<OggPageReader>,
    /// Fin de la dernière page prise en compte dans la table de seek
    scanned_until: u64,
    max_header_bytes: usize,
}

impl Default for OggVorbisState {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HEADER_BYTES)
    }
}

impl OggVorbisState {
    pub fn new(max_header_bytes: usize) -> Self {
        Self {
            info: None,
            comments: HashMap::new(),
            parse_attempted: false,
            pending: Vec::new(),
            reader: None,
            scanned_until: 0,
            max_header_bytes,
        }
    }

    pub fn info(&self) -> Option<&OggVorbisStreamInfo> {
        self.info.as_ref()
    }

    pub fn comments(&self) -> &HashMap<String, String> {
        &self.comments
    }

    /// Vrai une fois l'analyse terminée, qu'elle ait abouti ou non
    pub fn parse_attempted(&self) -> bool {
        self.parse_attempted
    }

    pub fn is_parsed(&self) -> bool {
        self.info.is_some()
    }

    /// Octets initiaux encore en attente des en-têtes
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Ajoute des octets du flux.
    ///
    /// Retourne `true` lorsque les en-têtes viennent d'être obtenus.
    pub fn feed(&mut self, bytes: &[u8]) -> bool {
        if self.reader.is_some() {
            self.scan(bytes);
            return false;
        }
        if self.parse_attempted {
            return false;
        }

        self.pending.extend_from_slice(bytes);
        match OggVorbisHeaderParser.parse(&self.pending[..]) {
            Some(headers) => {
                debug!(
                    sample_rate = headers.stream.sample_rate,
                    channels = headers.stream.channels,
                    comments = headers.comments.len(),
                    "Ogg Vorbis headers parsed"
                );
                let pending = std::mem::take(&mut self.pending);
                self.scanned_until = headers.consumed as u64;
                self.info = Some(headers.stream.into());
                self.comments = headers.comments;
                self.parse_attempted = true;
                self.reader = Some(OggPageReader::starting_at(headers.consumed as u64));
                self.scan(&pending[headers.consumed..]);
                true
            }
            None if self.pending.len() > self.max_header_bytes => {
                warn!(
                    buffered = self.pending.len(),
                    "No Ogg Vorbis headers found, giving up"
                );
                self.pending = Vec::new();
                self.parse_attempted = true;
                false
            }
            None => false,
        }
    }

    /// Les prochains octets fournis commencent à `offset` dans le flux
    pub fn reposition(&mut self, offset: u64) {
        if self.reader.is_some() {
            self.reader = Some(OggPageReader::starting_at(offset));
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.max_header_bytes);
    }

    fn scan(&mut self, bytes: &[u8]) {
        let (Some(reader), Some(info)) = (self.reader.as_mut(), self.info.as_mut()) else {
            return;
        };
        reader.push(bytes);
        while let Some(page) = reader.next_page() {
            // Pages déjà vues avant un seek arrière
            if page.offset < self.scanned_until {
                continue;
            }
            self.scanned_until = page.offset + page.len() as u64;
            info.record_page(&page);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ogg::fixtures;

    #[test]
    fn test_headers_parsed_across_chunks() {
        let stream = fixtures::vorbis_stream(22_050, 1, &[("album", "Live")], 2);
        let mut state = OggVorbisState::default();

        let mut parsed_at = None;
        for (index, chunk) in stream.chunks(50).enumerate() {
            if state.feed(chunk) {
                parsed_at = Some(index);
            }
        }

        assert!(parsed_at.is_some());
        assert!(state.parse_attempted());
        assert_eq!(state.pending_len(), 0);
        assert_eq!(state.comments()["album"], "Live");

        let info = state.info().unwrap();
        assert_eq!(info.sample_rate, 22_050);
        assert_eq!(info.page_granules, vec![1024, 2048]);
        assert_eq!(info.page_count, 4);
    }

    #[test]
    fn test_seek_table_grows_after_parse() {
        let mut state = OggVorbisState::default();
        assert!(state.feed(&fixtures::header_pages(44_100, 2, &[])));
        assert_eq!(state.info().unwrap().page_offsets.len(), 0);

        let first = fixtures::audio_page(1, false);
        let second = fixtures::audio_page(2, true);
        state.feed(&first);
        state.feed(&second);

        let headers_len = fixtures::header_pages(44_100, 2, &[]).len() as u64;
        let info = state.info().unwrap();
        assert_eq!(info.page_offsets, vec![headers_len, headers_len + first.len() as u64]);
        assert_eq!(info.total_samples, 2048);
    }

    #[test]
    fn test_gives_up_after_limit() {
        let mut state = OggVorbisState::new(128);
        assert!(!state.feed(&[0u8; 100]));
        assert!(!state.parse_attempted());
        assert!(!state.feed(&[0u8; 100]));
        assert!(state.parse_attempted());
        assert!(!state.is_parsed());
        assert_eq!(state.pending_len(), 0);

        // Plus aucune bufferisation après abandon
        assert!(!state.feed(&fixtures::header_pages(44_100, 2, &[])));
        assert_eq!(state.pending_len(), 0);
    }

    #[test]
    fn test_backward_reposition_does_not_duplicate_pages() {
        let mut state = OggVorbisState::default();
        let headers = fixtures::header_pages(44_100, 2, &[]);
        let page = fixtures::audio_page(1, false);
        state.feed(&headers);
        state.feed(&page);

        state.reposition(headers.len() as u64);
        state.feed(&page);

        let info = state.info().unwrap();
        assert_eq!(info.page_offsets.len(), 1);
        assert_eq!(info.page_count, 3);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut state = OggVorbisState::default();
        state.feed(&fixtures::vorbis_stream(44_100, 2, &[], 1));
        state.reset();
        assert!(!state.is_parsed());
        assert!(!state.parse_attempted());
        assert!(state.comments().is_empty());
    }
}
