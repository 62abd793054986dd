//! En-têtes Vorbis : identification (type 1), commentaires (type 3), setup (type 5)

use std::collections::HashMap;

use tracing::trace;

use super::{
    converter::{OggVorbisStreamData, OggVorbisStreamInfo},
    page::{OggPage, OggPageReader, PacketAssembler},
    Parser,
};

const VORBIS_MAGIC: &[u8; 6] = b"vorbis";
const IDENTIFICATION_LEN: usize = 30;

const PACKET_IDENTIFICATION: u8 = 1;
const PACKET_COMMENT: u8 = 3;
const PACKET_SETUP: u8 = 5;

/// Résultat de l'analyse des en-têtes d'un flux Ogg Vorbis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OggVorbisHeaders {
    pub stream: OggVorbisStreamData,
    pub vendor: String,
    /// Commentaires `CLE=valeur`, clés en majuscules
    pub comments: HashMap<String, String>,
    /// Octets couverts par les pages complètes analysées
    pub consumed: usize,
}

/// Paramètres de l'en-tête d'identification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Identification {
    channels: u8,
    sample_rate: u32,
    bitrate_max: i32,
    bitrate_nominal: i32,
    bitrate_min: i32,
    blocksize0: i32,
    blocksize1: i32,
}

/// Analyse pure des premières pages d'un flux Ogg Vorbis.
///
/// Retourne `None` tant que les trois en-têtes ne sont pas tous présents.
/// Toutes les pages complètes de l'entrée alimentent la table de seek.
#[derive(Debug, Default, Clone, Copy)]
pub struct OggVorbisHeaderParser;

impl Parser<&[u8]> for OggVorbisHeaderParser {
    type Output = Option<OggVorbisHeaders>;

    fn parse(&self, bytes: &[u8]) -> Self::Output {
        let mut reader = OggPageReader::new();
        reader.push(bytes);

        let mut assembler = PacketAssembler::new();
        let mut info = OggVorbisStreamInfo::default();
        let mut serial = None;
        let mut identification = None;
        let mut comments = None;
        let mut setup = false;

        while let Some(page) = reader.next_page() {
            if *serial.get_or_insert(page.serial) != page.serial {
                trace!(serial = page.serial, "Ignoring page from another logical stream");
                continue;
            }
            info.record_page(&page);
            if setup {
                continue;
            }

            for packet in assembler.push(&page) {
                match vorbis_packet_type(&packet) {
                    Some(PACKET_IDENTIFICATION) => identification = parse_identification(&packet),
                    Some(PACKET_COMMENT) => comments = parse_comments(&packet),
                    Some(PACKET_SETUP) => setup = identification.is_some() && comments.is_some(),
                    _ => {}
                }
            }
        }

        let identification = identification?;
        let (vendor, comments) = comments?;
        if !setup {
            return None;
        }

        info.serial_number = serial.unwrap_or_default() as usize;
        info.sample_rate = identification.sample_rate as usize;
        info.channels = identification.channels as usize;
        info.nominal_bitrate = kbps(identification.bitrate_nominal);
        info.bit_rate = info.nominal_bitrate;
        info.min_bitrate = kbps(identification.bitrate_min);
        info.max_bitrate = kbps(identification.bitrate_max);
        info.blocksize0 = identification.blocksize0 as isize;
        info.blocksize1 = identification.blocksize1 as isize;

        Some(OggVorbisHeaders {
            stream: info.try_into().ok()?,
            vendor,
            comments,
            consumed: reader.position() as usize,
        })
    }
}

impl OggVorbisStreamInfo {
    /// Compte la page et l'ajoute à la table de seek si sa granule est valide
    pub fn record_page(&mut self, page: &OggPage) {
        self.page_count += 1;
        if page.granule_position > 0 {
            let granule = page.granule_position as u64;
            self.page_offsets.push(page.offset);
            self.page_granules.push(granule);
            self.total_samples = self.total_samples.max(granule);
        }
        if page.granule_position >= 0 {
            self.granule_position = page.granule_position;
        }
    }
}

/// Débit annoncé (bit/s, éventuellement négatif ou nul) en kbit/s
fn kbps(bits_per_second: i32) -> usize {
    (bits_per_second.max(0) / 1000) as usize
}

fn vorbis_packet_type(packet: &[u8]) -> Option<u8> {
    if packet.len() > VORBIS_MAGIC.len() && &packet[1..7] == VORBIS_MAGIC {
        Some(packet[0])
    } else {
        None
    }
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let slice = bytes.get(at..at + 4)?;
    Some(u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

fn read_i32(bytes: &[u8], at: usize) -> Option<i32> {
    read_u32(bytes, at).map(|value| value as i32)
}

fn parse_identification(packet: &[u8]) -> Option<Identification> {
    if packet.len() < IDENTIFICATION_LEN {
        return None;
    }
    let version = read_u32(packet, 7)?;
    let channels = packet[11];
    let sample_rate = read_u32(packet, 12)?;
    let blocksizes = packet[28];
    let framing = packet[29] & 0x01;
    if version != 0 || channels == 0 || sample_rate == 0 || framing == 0 {
        trace!("Invalid Vorbis identification header");
        return None;
    }

    Some(Identification {
        channels,
        sample_rate,
        bitrate_max: read_i32(packet, 16)?,
        bitrate_nominal: read_i32(packet, 20)?,
        bitrate_min: read_i32(packet, 24)?,
        blocksize0: 1 << (blocksizes & 0x0f),
        blocksize1: 1 << (blocksizes >> 4),
    })
}

fn parse_comments(packet: &[u8]) -> Option<(String, HashMap<String, String>)> {
    let mut cursor = 7;
    let vendor_len = read_u32(packet, cursor)? as usize;
    cursor += 4;
    let vendor = String::from_utf8_lossy(packet.get(cursor..cursor + vendor_len)?).into_owned();
    cursor += vendor_len;

    let count = read_u32(packet, cursor)? as usize;
    cursor += 4;

    let mut comments = HashMap::new();
    for _ in 0..count {
        let len = read_u32(packet, cursor)? as usize;
        cursor += 4;
        let entry = String::from_utf8_lossy(packet.get(cursor..cursor + len)?).into_owned();
        cursor += len;

        match entry.split_once('=') {
            Some((key, value)) => comments.insert(key.to_string(), value.to_string()),
            None => comments.insert(String::new(), entry),
        };
    }
    Some((vendor, comments))
}
