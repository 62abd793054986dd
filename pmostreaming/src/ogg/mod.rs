//! # Conteneur Ogg Vorbis
//!
//! Analyse incrémentale d'un flux Ogg Vorbis reçu par morceaux :
//!
//! - [`page`] : découpage en pages (CRC, resynchronisation, positions absolues)
//! - [`vorbis`] : en-têtes d'identification, de commentaires et de setup
//! - [`converter`] : enregistrement à largeurs fixes ↔ description native
//! - [`state`] : état par entrée (bufferisation initiale, table de seek)

pub mod converter;
pub mod crc;
pub mod page;
pub mod state;
pub mod vorbis;

use crate::parsers::Parser;

pub use converter::{
    FieldOutOfRange, OggVorbisConverter, OggVorbisStreamData, OggVorbisStreamInfo,
};
pub use page::{OggPage, OggPageReader, PacketAssembler};
pub use state::OggVorbisState;
pub use vorbis::{OggVorbisHeaderParser, OggVorbisHeaders};

#[cfg(test)]
pub(crate) mod fixtures {
    //! Flux Ogg Vorbis synthétiques pour les tests

    use super::OggPage;

    pub const SERIAL: u32 = 0x5eed;
    pub const VENDOR: &str = "pmostream test vendor";
    pub const SAMPLES_PER_PAGE: i64 = 1024;

    pub fn identification_packet(sample_rate: u32, channels: u8) -> Vec<u8> {
        let mut packet = vec![1];
        packet.extend_from_slice(b"vorbis");
        packet.extend_from_slice(&0u32.to_le_bytes());
        packet.push(channels);
        packet.extend_from_slice(&sample_rate.to_le_bytes());
        packet.extend_from_slice(&0i32.to_le_bytes());
        packet.extend_from_slice(&128_000i32.to_le_bytes());
        packet.extend_from_slice(&0i32.to_le_bytes());
        packet.push(0xb8);
        packet.push(1);
        packet
    }

    pub fn comment_packet(comments: &[(&str, &str)]) -> Vec<u8> {
        let mut packet = vec![3];
        packet.extend_from_slice(b"vorbis");
        packet.extend_from_slice(&(VENDOR.len() as u32).to_le_bytes());
        packet.extend_from_slice(VENDOR.as_bytes());
        packet.extend_from_slice(&(comments.len() as u32).to_le_bytes());
        for (key, value) in comments {
            let entry = if key.is_empty() {
                value.to_string()
            } else {
                format!("{key}={value}")
            };
            packet.extend_from_slice(&(entry.len() as u32).to_le_bytes());
            packet.extend_from_slice(entry.as_bytes());
        }
        packet.push(1);
        packet
    }

    pub fn setup_packet() -> Vec<u8> {
        let mut packet = vec![5];
        packet.extend_from_slice(b"vorbis");
        packet.extend_from_slice(&[0x42; 24]);
        packet
    }

    /// Deux pages d'en-têtes
    pub fn header_pages(sample_rate: u32, channels: u8, comments: &[(&str, &str)]) -> Vec<u8> {
        let mut bytes = OggPage::with_packets(
            SERIAL,
            0,
            0,
            0x02,
            &[&identification_packet(sample_rate, channels)],
        )
        .encode();
        bytes.extend(
            OggPage::with_packets(SERIAL, 1, 0, 0, &[&comment_packet(comments), &setup_packet()])
                .encode(),
        );
        bytes
    }

    /// Page audio `index` (à partir de 1), granule `index * SAMPLES_PER_PAGE`
    pub fn audio_page(index: u32, last: bool) -> Vec<u8> {
        let payload = vec![index as u8; 100];
        let header_type = if last { 0x04 } else { 0 };
        OggPage::with_packets(
            SERIAL,
            index + 1,
            index as i64 * SAMPLES_PER_PAGE,
            header_type,
            &[&payload],
        )
        .encode()
    }

    pub fn vorbis_stream(
        sample_rate: u32,
        channels: u8,
        comments: &[(&str, &str)],
        audio_pages: u32,
    ) -> Vec<u8> {
        let mut bytes = header_pages(sample_rate, channels, comments);
        for index in 1..=audio_pages {
            bytes.extend(audio_page(index, index == audio_pages));
        }
        bytes
    }
}
