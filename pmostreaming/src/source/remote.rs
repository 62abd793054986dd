//! Source HTTP/Icecast pilotée par le [`NetworkingClient`]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use bytes::Bytes;
use pmoutils::Guarded;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};
use url::Url;

use super::{
    AudioStreamSource, AudioStreamSourceDelegate, DelegateSlot, IcyHeadersProcessor,
    IcyProcessing, MetadataStreamItem, MetadataStreamProcessor,
};
use crate::error::{Error, NetworkError};
use crate::network::{NetworkDataStream, NetworkingClient, StreamEvent, StreamRequest};
use crate::parsers::{AudioFileType, HeaderParserOutput, HttpHeaderParser, Parser};

/// Capacités connues de la source et position courante
#[derive(Debug, Default)]
struct RemoteState {
    stream: Option<Arc<NetworkDataStream>>,
    supports_seek: bool,
    length: u64,
    file_type: AudioFileType,
}

/// Traitement du corps propre à une requête
struct BodyProcessor {
    icy: IcyHeadersProcessor,
    metadata: Option<MetadataStreamProcessor>,
}

impl BodyProcessor {
    fn new(metadata_step: usize) -> Self {
        Self {
            icy: IcyHeadersProcessor::new(),
            metadata: (metadata_step > 0).then(|| MetadataStreamProcessor::new(metadata_step)),
        }
    }
}

/// Source distante : une requête HTTP par position de lecture.
///
/// Chaque `seek` annule la requête en cours et en ouvre une nouvelle avec
/// `Range: bytes=N-`. Les métadonnées ICY entrelacées sont extraites du
/// corps et remontées par `metadata_received`.
pub struct RemoteAudioSource {
    url: Url,
    client: Arc<NetworkingClient>,
    runtime: Handle,
    delegate: DelegateSlot,
    state: Guarded<RemoteState>,
    position: AtomicU64,
    /// Génération de la requête courante ; les événements plus anciens sont ignorés
    generation: AtomicU64,
    closed: AtomicBool,
    me: Weak<RemoteAudioSource>,
}

impl RemoteAudioSource {
    pub fn new(url: Url, client: Arc<NetworkingClient>) -> Arc<Self> {
        let runtime = client.runtime().clone();
        Arc::new_cyclic(|me| Self {
            url,
            client,
            runtime,
            delegate: DelegateSlot::default(),
            state: Guarded::new(RemoteState::default()),
            position: AtomicU64::new(0),
            generation: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            me: me.clone(),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn is_current(&self, generation: u64) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.generation.load(Ordering::SeqCst) == generation
    }

    fn stop_current(&self) {
        let previous = self.state.write(|state| state.stream.take());
        self.discard(previous);
    }

    fn discard(&self, stream: Option<Arc<NetworkDataStream>>) {
        if let Some(stream) = stream {
            stream.cancel();
            self.client.remove(&stream);
        }
    }

    fn apply_headers(&self, headers: &HeaderParserOutput, partial: bool) {
        self.state.write(|state| {
            state.supports_seek = headers.supports_seek;
            if headers.type_id != AudioFileType::Unknown {
                state.file_type = headers.type_id;
            }
            if headers.file_length > 0 {
                state.length = headers.file_length;
            } else if !partial {
                state.length = 0;
            }
        });
    }

    fn handle_response(&self, status: u16, headers: Option<HeaderParserOutput>) -> usize {
        let Some(headers) = headers else {
            trace!(url = %self.url, status, "Response without headers");
            return 0;
        };
        debug!(
            url = %self.url,
            status,
            seekable = headers.supports_seek,
            length = headers.file_length,
            file_type = %headers.type_id,
            metaint = headers.metadata_step,
            "Stream response"
        );
        if status == 200 && self.position() > 0 {
            // Range ignoré : le corps repart du début
            debug!(url = %self.url, requested = self.position(), "Range ignored, restarting at 0");
            self.position.store(0, Ordering::SeqCst);
            if let Some(delegate) = self.delegate.get() {
                delegate.position_reset(self);
            }
        }
        self.apply_headers(&headers, status == 206);
        headers.metadata_step
    }

    fn deliver_audio(&self, bytes: Bytes) {
        if bytes.is_empty() {
            return;
        }
        self.position.fetch_add(bytes.len() as u64, Ordering::SeqCst);
        if let Some(delegate) = self.delegate.get() {
            delegate.data_available(self, bytes);
        }
    }

    fn handle_body(&self, processor: &mut BodyProcessor, chunk: &[u8]) {
        let audio = match processor.icy.process(chunk) {
            IcyProcessing::NeedMoreData => return,
            IcyProcessing::Passthrough(bytes) => bytes,
            IcyProcessing::Parsed { headers, remaining } => {
                if let Some(headers) = headers {
                    self.apply_headers(&headers, false);
                    if headers.metadata_step > 0 {
                        processor.metadata = Some(MetadataStreamProcessor::new(headers.metadata_step));
                    }
                }
                remaining
            }
        };

        match processor.metadata.as_mut() {
            Some(metadata) => {
                for item in metadata.process(&audio) {
                    match item {
                        MetadataStreamItem::Audio(bytes) => self.deliver_audio(bytes),
                        MetadataStreamItem::Metadata(tags) => {
                            trace!(url = %self.url, ?tags, "ICY metadata");
                            if let Some(delegate) = self.delegate.get() {
                                delegate.metadata_received(tags);
                            }
                        }
                    }
                }
            }
            None => self.deliver_audio(audio),
        }
    }

    fn handle_complete(&self, result: std::result::Result<(), NetworkError>) {
        let delegate = self.delegate.get();
        match result {
            Ok(()) => {
                debug!(url = %self.url, position = self.position(), "Stream finished");
                if let Some(delegate) = delegate {
                    delegate.end_of_file_occurred(self);
                }
            }
            Err(NetworkError::Cancelled) => trace!(url = %self.url, "Stream cancelled"),
            Err(err) => {
                warn!(url = %self.url, error = %err, "Stream failed");
                if let Some(delegate) = delegate {
                    delegate.error_occurred(self, Error::Network(err));
                }
            }
        }
    }
}

/// Consomme les événements d'une requête tant qu'elle reste la requête courante
async fn pump(
    source: Weak<RemoteAudioSource>,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<StreamEvent>,
) {
    let mut processor = BodyProcessor::new(0);
    while let Some(event) = events.recv().await {
        let Some(current) = source.upgrade() else {
            return;
        };
        if !current.is_current(generation) {
            return;
        }
        match event {
            StreamEvent::Response(info) => {
                let step = current.handle_response(info.status, HttpHeaderParser.parse(&info));
                processor = BodyProcessor::new(step);
            }
            StreamEvent::Data(chunk) => current.handle_body(&mut processor, &chunk),
            StreamEvent::Complete(result) => {
                current.handle_complete(result);
                return;
            }
        }
    }
}

impl AudioStreamSource for RemoteAudioSource {
    fn id(&self) -> &str {
        self.url.as_str()
    }

    fn set_delegate(&self, delegate: Weak<dyn AudioStreamSourceDelegate>) {
        self.delegate.set(delegate);
    }

    fn remove_delegate(&self) {
        self.delegate.clear();
    }

    fn position(&self) -> u64 {
        self.position.load(Ordering::SeqCst)
    }

    fn length(&self) -> u64 {
        self.state.read(|state| state.length)
    }

    fn supports_seek(&self) -> bool {
        self.state.read(|state| state.supports_seek)
    }

    fn seek(&self, offset: u64) {
        // Génération et flux courant changent sous le même verrou
        let opened = self.state.write(|state| {
            if self.closed.load(Ordering::SeqCst) {
                return None;
            }
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            self.position.store(offset, Ordering::SeqCst);

            let request = StreamRequest::new(self.url.clone()).with_range_start(offset);
            let stream = self.client.stream(request);
            let events = stream.take_events();
            let previous = state.stream.replace(stream);
            Some((generation, events, previous))
        });
        let Some((generation, events, previous)) = opened else {
            return;
        };
        self.discard(previous);

        debug!(url = %self.url, offset, generation, "Opening remote stream");
        if let Some(events) = events {
            self.runtime.spawn(pump(self.me.clone(), generation, events));
        }
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(url = %self.url, "Closing remote source");
        self.stop_current();
    }

    fn audio_file_type(&self) -> AudioFileType {
        self.state.read(|state| state.file_type)
    }
}

impl Drop for RemoteAudioSource {
    fn drop(&mut self) {
        self.stop_current();
    }
}
