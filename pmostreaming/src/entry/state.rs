//! État mutable d'une entrée, toujours manipulé sous son verrou

use crate::ogg::OggVorbisState;

/// Nombre de paquets au-delà duquel l'estimation du débit n'évolue plus
pub const BITRATE_ESTIMATION_WINDOW: usize = 4096;

/// Paquets compressés reçus, pour l'estimation du débit
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedPacketsState {
    pub count: usize,
    pub size_total: u64,
    pub window: usize,
}

impl Default for ProcessedPacketsState {
    fn default() -> Self {
        Self {
            count: 0,
            size_total: 0,
            window: BITRATE_ESTIMATION_WINDOW,
        }
    }
}

impl ProcessedPacketsState {
    pub fn record(&mut self, byte_size: u64) {
        if self.count < self.window {
            self.count += 1;
            self.size_total += byte_size;
        }
    }

    pub fn average_packet_size(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.size_total as f64 / self.count as f64
        }
    }
}

/// Trames PCM mises en file et jouées ; `played <= queued`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryFramesState {
    pub queued: u64,
    pub played: u64,
    /// -1 tant qu'aucune trame n'a été mise en file
    pub last_frame_queued: i64,
}

impl Default for EntryFramesState {
    fn default() -> Self {
        Self {
            queued: 0,
            played: 0,
            last_frame_queued: -1,
        }
    }
}

/// Demande de seek en cours ; seule la version courante peut être validée
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SeekRequest {
    pub requested: bool,
    pub time: f64,
    pub version: u64,
}

/// Format des paquets compressés publié par le décodeur
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StreamFormat {
    pub sample_rate: f64,
    pub frames_per_packet: u32,
    /// 0 pour un format à débit variable
    pub bytes_per_frame: u32,
}

impl StreamFormat {
    /// Durée d'un paquet en secondes (0 si inconnue)
    pub fn packet_duration(&self) -> f64 {
        if self.sample_rate > 0.0 {
            self.frames_per_packet as f64 / self.sample_rate
        } else {
            0.0
        }
    }
}

/// État du conteneur/flux tel que connu à ce stade
#[derive(Debug, Default)]
pub struct AudioStreamState {
    pub format_resolved: bool,
    /// Position du premier octet audio dans la source
    pub data_offset: u64,
    pub data_byte_count: Option<u64>,
    pub data_packet_count: u64,
    pub data_packet_offset: Option<u64>,
    /// Débit en bit/s annoncé par le conteneur
    pub bit_rate: Option<f64>,
    pub format: StreamFormat,
    pub ogg: OggVorbisState,
}

impl AudioStreamState {
    pub fn new(ogg_max_header_bytes: usize) -> Self {
        Self {
            ogg: OggVorbisState::new(ogg_max_header_bytes),
            ..Self::default()
        }
    }
}

/// Tout l'état d'une entrée protégé par son verrou
#[derive(Debug, Default)]
pub(crate) struct EntryState {
    pub processed_packets: ProcessedPacketsState,
    pub frames: EntryFramesState,
    pub seek_request: SeekRequest,
    /// Temps du dernier seek validé
    pub seek_time: f64,
    pub stream_state: AudioStreamState,
}
