//! Séparation audio / métadonnées d'un corps ICY de cadence N
//!
//! Après chaque bloc de N octets audio, un octet donne la longueur (×16)
//! du bloc de métadonnées qui suit. Les frontières de morceaux réseau sont
//! quelconques : l'état est conservé d'un appel à l'autre.

use bytes::Bytes;
use tracing::debug;

use crate::parsers::{MetadataParser, MetadataParsingError, Parser, StreamMetadata};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataStreamItem {
    Audio(Bytes),
    Metadata(StreamMetadata),
}

#[derive(Debug)]
enum Phase {
    /// Octets audio restants avant le prochain octet de longueur
    Audio(usize),
    Length,
    Metadata { remaining: usize, block: Vec<u8> },
}

#[derive(Debug)]
pub struct MetadataStreamProcessor {
    step: usize,
    phase: Phase,
}

impl MetadataStreamProcessor {
    /// `step` doit être strictement positif
    pub fn new(step: usize) -> Self {
        assert!(step > 0, "ICY metadata step must be positive");
        Self {
            step,
            phase: Phase::Audio(step),
        }
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn process(&mut self, chunk: &[u8]) -> Vec<MetadataStreamItem> {
        let mut items = Vec::new();
        let mut cursor = 0;

        while cursor < chunk.len() {
            match &mut self.phase {
                Phase::Audio(remaining) => {
                    let take = (*remaining).min(chunk.len() - cursor);
                    items.push(MetadataStreamItem::Audio(Bytes::copy_from_slice(
                        &chunk[cursor..cursor + take],
                    )));
                    cursor += take;
                    *remaining -= take;
                    if *remaining == 0 {
                        self.phase = Phase::Length;
                    }
                }
                Phase::Length => {
                    let length = chunk[cursor] as usize * 16;
                    cursor += 1;
                    self.phase = if length == 0 {
                        Phase::Audio(self.step)
                    } else {
                        Phase::Metadata {
                            remaining: length,
                            block: Vec::with_capacity(length),
                        }
                    };
                }
                Phase::Metadata { remaining, block } => {
                    let take = (*remaining).min(chunk.len() - cursor);
                    block.extend_from_slice(&chunk[cursor..cursor + take]);
                    cursor += take;
                    *remaining -= take;
                    if *remaining == 0 {
                        match MetadataParser.parse(Some(&block[..])) {
                            Ok(tags) => items.push(MetadataStreamItem::Metadata(tags)),
                            Err(MetadataParsingError::Empty) => {}
                            Err(err) => debug!(error = %err, "Ignoring ICY metadata block"),
                        }
                        self.phase = Phase::Audio(self.step);
                    }
                }
            }
        }
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata_block(text: &str) -> Vec<u8> {
        let blocks = text.len().div_ceil(16);
        let mut bytes = vec![blocks as u8];
        bytes.extend_from_slice(text.as_bytes());
        bytes.resize(1 + blocks * 16, 0);
        bytes
    }

    fn collect(items: Vec<MetadataStreamItem>, audio: &mut Vec<u8>, tags: &mut Vec<StreamMetadata>) {
        for item in items {
            match item {
                MetadataStreamItem::Audio(bytes) => audio.extend_from_slice(&bytes),
                MetadataStreamItem::Metadata(map) => tags.push(map),
            }
        }
    }

    fn body() -> Vec<u8> {
        let mut body = b"AAAAAAAA".to_vec();
        body.extend(metadata_block("StreamTitle='One';"));
        body.extend_from_slice(b"BBBBBBBB");
        body.push(0);
        body.extend_from_slice(b"CCCCCCCC");
        body.extend(metadata_block("StreamTitle='Two';"));
        body.extend_from_slice(b"DDD");
        body
    }

    #[test]
    fn test_split_in_one_chunk() {
        let mut processor = MetadataStreamProcessor::new(8);
        let (mut audio, mut tags) = (Vec::new(), Vec::new());
        collect(processor.process(&body()), &mut audio, &mut tags);

        assert_eq!(audio, b"AAAAAAAABBBBBBBBCCCCCCCCDDD");
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0]["StreamTitle"], "One");
        assert_eq!(tags[1]["StreamTitle"], "Two");
    }

    #[test]
    fn test_split_across_every_chunk_size() {
        let body = body();
        for size in 1..body.len() {
            let mut processor = MetadataStreamProcessor::new(8);
            let (mut audio, mut tags) = (Vec::new(), Vec::new());
            for chunk in body.chunks(size) {
                collect(processor.process(chunk), &mut audio, &mut tags);
            }
            assert_eq!(audio, b"AAAAAAAABBBBBBBBCCCCCCCCDDD", "chunk size {size}");
            assert_eq!(tags.len(), 2, "chunk size {size}");
        }
    }

    #[test]
    fn test_padding_only_block_is_skipped() {
        let mut processor = MetadataStreamProcessor::new(2);
        let mut body = b"xy".to_vec();
        body.push(1);
        body.extend_from_slice(&[0u8; 16]);
        body.extend_from_slice(b"z");

        let (mut audio, mut tags) = (Vec::new(), Vec::new());
        collect(processor.process(&body), &mut audio, &mut tags);
        assert_eq!(audio, b"xyz");
        assert!(tags.is_empty());
    }

    #[test]
    #[should_panic]
    fn test_zero_step_is_rejected() {
        MetadataStreamProcessor::new(0);
    }
}
