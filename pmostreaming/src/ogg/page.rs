//! # Pages Ogg incrémentales
//!
//! [`OggPageReader`] découpe un flux d'octets arrivant par morceaux en pages
//! Ogg complètes :
//!
//! 1. recherche du motif de synchronisation `OggS`
//! 2. lecture de l'en-tête de 27 octets et de la table des segments
//! 3. validation CRC32, resynchronisation en cas de corruption
//! 4. position absolue (en octets) de chaque page dans le flux
//!
//! [`PacketAssembler`] reconstitue ensuite les paquets à partir du laçage,
//! y compris les paquets qui chevauchent plusieurs pages.

use tracing::{debug, trace};

use super::crc;

/// Motif de synchronisation d'une page
pub const CAPTURE_PATTERN: &[u8; 4] = b"OggS";

/// Taille de l'en-tête fixe d'une page
pub const HEADER_LEN: usize = 27;

const FLAG_CONTINUED: u8 = 0x01;
const FLAG_BOS: u8 = 0x02;
const FLAG_EOS: u8 = 0x04;

/// Page Ogg décodée
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OggPage {
    /// Position absolue du premier octet de la page dans le flux
    pub offset: u64,
    pub header_type: u8,
    /// Position granule (-1 : aucun paquet ne se termine sur cette page)
    pub granule_position: i64,
    pub serial: u32,
    pub sequence: u32,
    pub lacing: Vec<u8>,
    pub body: Vec<u8>,
}

impl OggPage {
    /// Construit une page contenant des paquets complets.
    ///
    /// Chaque paquet est lacé en segments de 255 octets suivis d'un
    /// segment terminal plus court.
    pub fn with_packets(
        serial: u32,
        sequence: u32,
        granule_position: i64,
        header_type: u8,
        packets: &[&[u8]],
    ) -> Self {
        let mut lacing = Vec::new();
        let mut body = Vec::new();
        for packet in packets {
            let mut remaining = packet.len();
            while remaining >= 255 {
                lacing.push(255);
                remaining -= 255;
            }
            lacing.push(remaining as u8);
            body.extend_from_slice(packet);
        }
        Self {
            offset: 0,
            header_type,
            granule_position,
            serial,
            sequence,
            lacing,
            body,
        }
    }

    pub fn is_continuation(&self) -> bool {
        self.header_type & FLAG_CONTINUED != 0
    }

    pub fn is_first(&self) -> bool {
        self.header_type & FLAG_BOS != 0
    }

    pub fn is_last(&self) -> bool {
        self.header_type & FLAG_EOS != 0
    }

    /// Taille de la page sérialisée
    pub fn len(&self) -> usize {
        HEADER_LEN + self.lacing.len() + self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Sérialise la page avec un CRC valide
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.len());
        bytes.extend_from_slice(CAPTURE_PATTERN);
        bytes.push(0);
        bytes.push(self.header_type);
        bytes.extend_from_slice(&self.granule_position.to_le_bytes());
        bytes.extend_from_slice(&self.serial.to_le_bytes());
        bytes.extend_from_slice(&self.sequence.to_le_bytes());
        bytes.extend_from_slice(&[0; 4]);
        bytes.push(self.lacing.len() as u8);
        bytes.extend_from_slice(&self.lacing);
        bytes.extend_from_slice(&self.body);

        let checksum = crc::page_checksum(&bytes);
        bytes[22..26].copy_from_slice(&checksum.to_le_bytes());
        bytes
    }
}

/// Lecteur de pages alimenté par morceaux
#[derive(Debug, Default)]
pub struct OggPageReader {
    buffer: Vec<u8>,
    /// Position absolue de `buffer[0]`
    base_offset: u64,
    pages_read: u64,
    discarded: u64,
}

impl OggPageReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lecteur dont le premier octet poussé est à la position `offset` du flux
    pub fn starting_at(offset: u64) -> Self {
        Self {
            base_offset: offset,
            ..Self::default()
        }
    }

    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Position absolue du premier octet non consommé
    pub fn position(&self) -> u64 {
        self.base_offset
    }

    /// Octets en attente d'une page complète
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn pages_read(&self) -> u64 {
        self.pages_read
    }

    /// Octets ignorés lors des resynchronisations
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Page complète suivante, ou `None` s'il faut davantage de données
    pub fn next_page(&mut self) -> Option<OggPage> {
        loop {
            match self
                .buffer
                .windows(CAPTURE_PATTERN.len())
                .position(|window| window == CAPTURE_PATTERN)
            {
                Some(0) => {}
                Some(pos) => {
                    trace!(skipped = pos, "Skipping bytes before Ogg capture pattern");
                    self.skip(pos);
                }
                None => {
                    // Le motif peut être coupé entre deux morceaux
                    let keep = self.buffer.len().min(CAPTURE_PATTERN.len() - 1);
                    let drop = self.buffer.len() - keep;
                    self.skip(drop);
                    return None;
                }
            }

            if self.buffer.len() < HEADER_LEN {
                return None;
            }
            if self.buffer[4] != 0 {
                debug!("Unsupported Ogg version, resyncing");
                self.skip(1);
                continue;
            }

            let segments = self.buffer[26] as usize;
            if self.buffer.len() < HEADER_LEN + segments {
                return None;
            }
            let lacing = &self.buffer[HEADER_LEN..HEADER_LEN + segments];
            let body_len: usize = lacing.iter().map(|len| *len as usize).sum();
            let total = HEADER_LEN + segments + body_len;
            if self.buffer.len() < total {
                return None;
            }

            let stored = u32::from_le_bytes([
                self.buffer[22],
                self.buffer[23],
                self.buffer[24],
                self.buffer[25],
            ]);
            let computed = crc::page_checksum(&self.buffer[..total]);
            if stored != computed {
                debug!(
                    offset = self.base_offset,
                    "Ogg page CRC mismatch: expected 0x{stored:08x}, got 0x{computed:08x}"
                );
                self.skip(1);
                continue;
            }

            let page = self.decode(segments, total);
            self.buffer.drain(..total);
            self.base_offset += total as u64;
            self.pages_read += 1;
            return Some(page);
        }
    }

    fn decode(&self, segments: usize, total: usize) -> OggPage {
        let header = &self.buffer[..HEADER_LEN];
        let mut granule = [0u8; 8];
        granule.copy_from_slice(&header[6..14]);
        OggPage {
            offset: self.base_offset,
            header_type: header[5],
            granule_position: i64::from_le_bytes(granule),
            serial: u32::from_le_bytes([header[14], header[15], header[16], header[17]]),
            sequence: u32::from_le_bytes([header[18], header[19], header[20], header[21]]),
            lacing: self.buffer[HEADER_LEN..HEADER_LEN + segments].to_vec(),
            body: self.buffer[HEADER_LEN + segments..total].to_vec(),
        }
    }

    fn skip(&mut self, count: usize) {
        self.buffer.drain(..count);
        self.base_offset += count as u64;
        self.discarded += count as u64;
    }
}

/// Reconstitue les paquets à partir des pages successives
#[derive(Debug, Default)]
pub struct PacketAssembler {
    current: Vec<u8>,
    /// Ignore la suite d'un paquet dont le début n'a pas été vu
    skip_partial: bool,
}

impl PacketAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paquets terminés sur cette page
    pub fn push(&mut self, page: &OggPage) -> Vec<Vec<u8>> {
        if page.is_continuation() {
            if self.current.is_empty() {
                self.skip_partial = true;
            }
        } else {
            if !self.current.is_empty() {
                trace!(dropped = self.current.len(), "Dropping unterminated Ogg packet");
                self.current.clear();
            }
            self.skip_partial = false;
        }

        let mut packets = Vec::new();
        let mut offset = 0;
        for segment in &page.lacing {
            let end = offset + *segment as usize;
            if !self.skip_partial {
                self.current.extend_from_slice(&page.body[offset..end]);
            }
            offset = end;

            if *segment < 255 {
                if self.skip_partial {
                    self.skip_partial = false;
                } else {
                    packets.push(std::mem::take(&mut self.current));
                }
            }
        }
        packets
    }

    pub fn reset(&mut self) {
        self.current.clear();
        self.skip_partial = false;
    }
}
