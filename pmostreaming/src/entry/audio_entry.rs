//! # Entrée audio
//!
//! Unité de lecture enveloppant une source de données. L'entrée se place
//! comme délégué de sa source, vérifie que chaque notification vient bien
//! de cette source, puis la transmet à son propre délégué (le décodeur).
//!
//! Elle tient à jour, sous verrou :
//!
//! - les paquets compressés reçus (estimation du débit)
//! - les trames mises en file et jouées (progression)
//! - la demande de seek courante et sa version
//! - l'état du flux (format, positions, sous-état Ogg Vorbis)

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use bytes::Bytes;
use pmoutils::{Guarded, Lock};
use tracing::{debug, trace};

use super::id::AudioEntryId;
use super::state::{AudioStreamState, EntryFramesState, EntryState, SeekRequest};
use crate::config_ext::StreamingSettings;
use crate::error::Error;
use crate::ogg::OggVorbisStreamInfo;
use crate::source::{AudioStreamSource, AudioStreamSourceDelegate, DelegateSlot};

pub struct AudioEntry {
    id: AudioEntryId,
    source: Arc<dyn AudioStreamSource>,
    output_sample_rate: f64,
    preferred_packets: usize,
    minimum_packets: usize,
    /// Sérialise les opérations sur la source (seek, fermeture)
    lock: Lock,
    state: Guarded<EntryState>,
    delegate: DelegateSlot,
    me: Weak<AudioEntry>,
}

impl AudioEntry {
    pub fn new(
        id: AudioEntryId,
        source: Arc<dyn AudioStreamSource>,
        settings: &StreamingSettings,
    ) -> Arc<Self> {
        let state = EntryState {
            stream_state: AudioStreamState::new(settings.ogg_max_header_bytes),
            ..EntryState::default()
        };
        Arc::new_cyclic(|me| Self {
            id,
            source,
            output_sample_rate: settings.output_sample_rate,
            preferred_packets: settings.preferred_bitrate_packets,
            minimum_packets: settings.minimum_bitrate_packets,
            lock: Lock::new(),
            state: Guarded::new(state),
            delegate: DelegateSlot::default(),
            me: me.clone(),
        })
    }

    pub fn id(&self) -> &AudioEntryId {
        &self.id
    }

    pub fn source(&self) -> &Arc<dyn AudioStreamSource> {
        &self.source
    }

    /// Délégué recevant les notifications de la source
    pub fn set_delegate(&self, delegate: Weak<dyn AudioStreamSourceDelegate>) {
        self.delegate.set(delegate);
    }

    pub fn remove_delegate(&self) {
        self.delegate.clear();
    }

    /// Vrai si `source` est la source de cette entrée
    pub fn has_same(&self, source: &dyn AudioStreamSource) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.source), source)
    }

    /// Démarre la livraison depuis le début
    pub fn open(&self) {
        self.seek(0);
    }

    /// Se réinscrit comme délégué de la source et la repositionne.
    /// La version de seek n'est pas modifiée.
    pub fn seek(&self, offset: u64) {
        self.lock.around(|| {
            let me: Weak<dyn AudioStreamSourceDelegate> = self.me.clone();
            self.source.set_delegate(me);
            self.state
                .write(|state| state.stream_state.ogg.reposition(offset));
            debug!(entry = %self.id, offset, "Seeking source");
            self.source.seek(offset);
        });
    }

    /// Coupe le lien avec la source et la ferme
    pub fn close(&self) {
        self.lock.around(|| {
            debug!(entry = %self.id, "Closing entry");
            self.source.remove_delegate();
            self.source.close();
        });
    }

    /// Remet les compteurs de trames à zéro
    pub fn reset(&self) {
        self.state
            .write(|state| state.frames = EntryFramesState::default());
    }

    /// Temps de lecture (secondes) : dernier seek validé + trames jouées
    pub fn progress(&self) -> f64 {
        let (seek_time, played) = self
            .state
            .read(|state| (state.seek_time, state.frames.played));
        if self.output_sample_rate > 0.0 {
            seek_time + played as f64 / self.output_sample_rate
        } else {
            seek_time
        }
    }

    /// Débit estimé en bit/s.
    ///
    /// Mesuré sur les paquets reçus dès qu'il y en a assez, sinon déduit
    /// du format (`bytes_per_frame * sample_rate * 8`).
    pub fn calculated_bitrate(&self) -> f64 {
        self.state.read(|state| {
            let format = &state.stream_state.format;
            let packets = &state.processed_packets;
            let packet_duration = format.packet_duration();
            let enough_packets = packets.count >= self.preferred_packets
                || (format.bytes_per_frame == 0 && packets.count >= self.minimum_packets);

            if enough_packets && packets.count > 0 && packet_duration > 0.0 {
                packets.average_packet_size() / packet_duration * 8.0
            } else {
                format.bytes_per_frame as f64 * format.sample_rate * 8.0
            }
        })
    }

    /// Octets de données audio : nombre explicite, sinon longueur de la
    /// source moins la position des données (0 si inconnue)
    pub fn audio_data_length_bytes(&self) -> u64 {
        let (byte_count, data_offset) = self.state.read(|state| {
            (
                state.stream_state.data_byte_count,
                state.stream_state.data_offset,
            )
        });
        match byte_count {
            Some(count) => count,
            None => self.source.length().saturating_sub(data_offset),
        }
    }

    /// Durée en secondes (0 si elle ne peut pas être déterminée)
    pub fn duration(&self) -> f64 {
        let exact = self.state.read(|state| {
            let format = &state.stream_state.format;
            let packets = state.stream_state.data_packet_offset?;
            (format.frames_per_packet > 0 && format.sample_rate > 0.0)
                .then(|| packets as f64 * format.frames_per_packet as f64 / format.sample_rate)
        });
        if let Some(duration) = exact {
            return duration;
        }

        let bitrate = self.calculated_bitrate();
        if bitrate < 1.0 || self.source.length() == 0 {
            return 0.0;
        }
        self.audio_data_length_bytes() as f64 / (bitrate / 8.0)
    }

    /// Enregistre une demande de seek ; retourne sa version
    pub fn request_seek(&self, time: f64) -> u64 {
        self.state.write(|state| {
            state.seek_request.requested = true;
            state.seek_request.time = time;
            state.seek_request.version += 1;
            state.seek_request.version
        })
    }

    /// Valide le seek `version` ; sans effet si une demande plus récente existe
    pub fn complete_seek(&self, version: u64, time: f64) -> bool {
        let applied = self.state.write(|state| {
            if state.seek_request.version != version {
                return false;
            }
            state.seek_time = time;
            state.frames = EntryFramesState::default();
            state.seek_request.requested = false;
            true
        });
        if !applied {
            trace!(entry = %self.id, version, "Ignoring stale seek completion");
        }
        applied
    }

    pub fn seek_request(&self) -> SeekRequest {
        self.state.read(|state| state.seek_request)
    }

    pub fn seek_time(&self) -> f64 {
        self.state.read(|state| state.seek_time)
    }

    /// Paquet compressé reçu par le décodeur
    pub fn record_packet(&self, byte_size: u64) {
        self.state
            .write(|state| state.processed_packets.record(byte_size));
    }

    pub fn processed_packet_count(&self) -> usize {
        self.state.read(|state| state.processed_packets.count)
    }

    pub fn frames_queued(&self, count: u64, last_frame: i64) {
        self.state.write(|state| {
            state.frames.queued += count;
            state.frames.last_frame_queued = last_frame;
        });
    }

    /// Trames jouées, bornées par les trames mises en file
    pub fn frames_played(&self, count: u64) {
        self.state.write(|state| {
            let frames = &mut state.frames;
            frames.played = (frames.played + count).min(frames.queued);
        });
    }

    pub fn frames_state(&self) -> EntryFramesState {
        self.state.read(|state| state.frames)
    }

    /// Publication du format par la couche de décodage
    pub fn update_stream_state<R>(&self, f: impl FnOnce(&mut AudioStreamState) -> R) -> R {
        self.state.write(|state| f(&mut state.stream_state))
    }

    pub fn read_stream_state<R>(&self, f: impl FnOnce(&AudioStreamState) -> R) -> R {
        self.state.read(|state| f(&state.stream_state))
    }

    /// Alimente le sous-état Ogg Vorbis ; retourne les commentaires au
    /// moment où les en-têtes sont obtenus
    pub fn feed_ogg_vorbis(&self, bytes: &[u8]) -> Option<HashMap<String, String>> {
        self.state.write(|state| {
            let stream = &mut state.stream_state;
            if !stream.ogg.feed(bytes) {
                return None;
            }
            let info = stream.ogg.info()?;
            if !stream.format_resolved && stream.format.sample_rate == 0.0 {
                stream.format.sample_rate = info.sample_rate as f64;
            }
            if info.nominal_bitrate > 0 {
                stream.bit_rate = Some(info.nominal_bitrate as f64 * 1000.0);
            }
            Some(stream.ogg.comments().clone())
        })
    }

    pub fn ogg_info(&self) -> Option<OggVorbisStreamInfo> {
        self.state
            .read(|state| state.stream_state.ogg.info().cloned())
    }

    /// Position (octets) à demander à la source pour atteindre `time`.
    ///
    /// Utilise la table de seek Ogg si elle couvre ce temps, sinon
    /// l'estimation du débit.
    pub fn seek_offset_for_time(&self, time: f64) -> u64 {
        let (from_table, data_offset, known_bitrate) = self.state.read(|state| {
            let stream = &state.stream_state;
            (
                stream.ogg.info().and_then(|info| info.offset_for_time(time)),
                stream.data_offset,
                stream.bit_rate,
            )
        });
        if let Some(offset) = from_table {
            return offset;
        }

        let mut bitrate = self.calculated_bitrate();
        if bitrate < 1.0 {
            bitrate = known_bitrate.unwrap_or(0.0);
        }
        let offset = data_offset + (time.max(0.0) * bitrate / 8.0) as u64;
        match self.source.length() {
            0 => offset,
            length => offset.min(length),
        }
    }
}

impl AudioStreamSourceDelegate for AudioEntry {
    fn data_available(&self, source: &dyn AudioStreamSource, data: Bytes) {
        if !self.has_same(source) {
            trace!(entry = %self.id, "Ignoring data from a foreign source");
            return;
        }
        let delegate = self.delegate.get();
        if source.audio_file_type().is_ogg() {
            if let Some(comments) = self.feed_ogg_vorbis(&data) {
                if let (false, Some(delegate)) = (comments.is_empty(), &delegate) {
                    delegate.metadata_received(comments);
                }
            }
        }
        if let Some(delegate) = delegate {
            delegate.data_available(source, data);
        }
    }

    fn error_occurred(&self, source: &dyn AudioStreamSource, error: Error) {
        if !self.has_same(source) {
            return;
        }
        if let Some(delegate) = self.delegate.get() {
            delegate.error_occurred(source, error);
        }
    }

    fn end_of_file_occurred(&self, source: &dyn AudioStreamSource) {
        if !self.has_same(source) {
            return;
        }
        if let Some(delegate) = self.delegate.get() {
            delegate.end_of_file_occurred(source);
        }
    }

    fn metadata_received(&self, metadata: HashMap<String, String>) {
        if let Some(delegate) = self.delegate.get() {
            delegate.metadata_received(metadata);
        }
    }

    fn position_reset(&self, source: &dyn AudioStreamSource) {
        if !self.has_same(source) {
            return;
        }
        debug!(entry = %self.id, "Source restarted at offset 0");
        self.state
            .write(|state| state.stream_state.ogg.reposition(0));
        if let Some(delegate) = self.delegate.get() {
            delegate.position_reset(source);
        }
    }
}

impl PartialEq for AudioEntry {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for AudioEntry {}

impl fmt::Debug for AudioEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioEntry")
            .field("id", &self.id)
            .field("source", &self.source.id())
            .field("progress", &self.progress())
            .finish()
    }
}
