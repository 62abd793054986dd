//! Réponse Shoutcast v1 : le corps commence par `ICY 200 OK` suivi des
//! en-têtes, puis des données audio après la ligne vide.

use bytes::Bytes;
use tracing::{debug, trace};

use crate::parsers::{HeaderParserOutput, IcyHeaderParser, Parser};

const ICY_STATUS_PREFIX: &[u8] = b"ICY ";

/// Taille maximale du bloc d'en-têtes bufferisé
pub const MAX_ICY_HEADER_BYTES: usize = 8 * 1024;

/// Résultat du traitement d'un morceau
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IcyProcessing {
    /// Bloc d'en-têtes incomplet
    NeedMoreData,
    /// Le corps n'est pas (ou plus) un bloc ICY : octets audio
    Passthrough(Bytes),
    /// Bloc d'en-têtes terminé ; `remaining` est le début des données audio
    Parsed {
        headers: Option<HeaderParserOutput>,
        remaining: Bytes,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Detecting,
    Buffering,
    Done,
}

#[derive(Debug)]
pub struct IcyHeadersProcessor {
    buffer: Vec<u8>,
    phase: Phase,
}

impl Default for IcyHeadersProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl IcyHeadersProcessor {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            phase: Phase::Detecting,
        }
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    pub fn process(&mut self, chunk: &[u8]) -> IcyProcessing {
        if self.phase == Phase::Done {
            return IcyProcessing::Passthrough(Bytes::copy_from_slice(chunk));
        }
        self.buffer.extend_from_slice(chunk);

        if self.phase == Phase::Detecting {
            let probe = self.buffer.len().min(ICY_STATUS_PREFIX.len());
            if self.buffer[..probe] != ICY_STATUS_PREFIX[..probe] {
                return self.finish_passthrough();
            }
            if probe < ICY_STATUS_PREFIX.len() {
                return IcyProcessing::NeedMoreData;
            }
            trace!("ICY status line detected in body");
            self.phase = Phase::Buffering;
        }

        match find_blank_line(&self.buffer) {
            Some((end, skip)) => {
                let headers = IcyHeaderParser.parse(&self.buffer[..end]);
                let remaining = Bytes::copy_from_slice(&self.buffer[end + skip..]);
                debug!(parsed = headers.is_some(), "ICY header block processed");
                self.buffer = Vec::new();
                self.phase = Phase::Done;
                IcyProcessing::Parsed { headers, remaining }
            }
            None if self.buffer.len() > MAX_ICY_HEADER_BYTES => {
                debug!("ICY header block too large, passing bytes through");
                self.finish_passthrough()
            }
            None => IcyProcessing::NeedMoreData,
        }
    }

    fn finish_passthrough(&mut self) -> IcyProcessing {
        self.phase = Phase::Done;
        IcyProcessing::Passthrough(Bytes::from(std::mem::take(&mut self.buffer)))
    }
}

/// Position et longueur du premier séparateur `\r\n\r\n` ou `\n\n`
fn find_blank_line(buffer: &[u8]) -> Option<(usize, usize)> {
    let crlf = buffer.windows(4).position(|w| w == b"\r\n\r\n").map(|p| (p, 4));
    let lf = buffer.windows(2).position(|w| w == b"\n\n").map(|p| (p, 2));
    match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::AudioFileType;

    #[test]
    fn test_plain_audio_passes_through() {
        let mut processor = IcyHeadersProcessor::new();
        assert_eq!(
            processor.process(b"\xff\xfbaudio"),
            IcyProcessing::Passthrough(Bytes::from_static(b"\xff\xfbaudio"))
        );
        assert!(processor.is_done());
        assert_eq!(
            processor.process(b"more"),
            IcyProcessing::Passthrough(Bytes::from_static(b"more"))
        );
    }

    #[test]
    fn test_headers_split_across_chunks() {
        let mut processor = IcyHeadersProcessor::new();
        assert_eq!(processor.process(b"IC"), IcyProcessing::NeedMoreData);
        assert_eq!(
            processor.process(b"Y 200 OK\r\ncontent-type: audio/mpeg\r\nicy-meta"),
            IcyProcessing::NeedMoreData
        );

        match processor.process(b"int: 4\r\n\r\nAUDIO") {
            IcyProcessing::Parsed { headers, remaining } => {
                let headers = headers.unwrap();
                assert_eq!(headers.metadata_step, 4);
                assert_eq!(headers.type_id, AudioFileType::Mp3);
                assert_eq!(remaining, Bytes::from_static(b"AUDIO"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_short_non_icy_prefix() {
        let mut processor = IcyHeadersProcessor::new();
        assert_eq!(
            processor.process(b"IX"),
            IcyProcessing::Passthrough(Bytes::from_static(b"IX"))
        );
    }

    #[test]
    fn test_oversized_block_is_released() {
        let mut processor = IcyHeadersProcessor::new();
        let mut block = b"ICY 200 OK\r\n".to_vec();
        block.resize(MAX_ICY_HEADER_BYTES + 1, b'x');
        match processor.process(&block) {
            IcyProcessing::Passthrough(bytes) => assert_eq!(bytes.len(), block.len()),
            other => panic!("unexpected {other:?}"),
        }
    }
}
