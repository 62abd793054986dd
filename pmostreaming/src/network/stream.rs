//! Flux logique de données associé à une tâche réseau

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use bytes::Bytes;
use pmoutils::Guarded;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tokio::sync::mpsc;
use tracing::trace;
use url::Url;

use super::client::SessionEvent;
use crate::error::NetworkError;

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

/// Identifiant d'un flux logique
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(u64);

impl StreamId {
    pub(crate) fn next() -> Self {
        StreamId(NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream-{}", self.0)
    }
}

/// Statut et en-têtes de la réponse initiale
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseInfo {
    pub status: u16,
    pub headers: HeaderMap,
}

impl ResponseInfo {
    pub fn new(status: u16, headers: HeaderMap) -> Self {
        Self { status, headers }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Requête décrivant le flux à ouvrir
#[derive(Debug, Clone)]
pub struct StreamRequest {
    pub url: Url,
    pub headers: HeaderMap,
    /// Position de départ (en-tête `Range: bytes=N-`)
    pub range_start: Option<u64>,
}

impl StreamRequest {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            headers: HeaderMap::new(),
            range_start: None,
        }
    }

    pub fn with_range_start(mut self, offset: u64) -> Self {
        self.range_start = (offset > 0).then_some(offset);
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// Événement livré au consommateur d'un flux, dans l'ordre de la tâche
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Response(ResponseInfo),
    Data(Bytes),
    /// Dernier événement du flux
    Complete(Result<(), NetworkError>),
}

/// Flux logique retourné par [`NetworkingClient::stream`](super::NetworkingClient::stream).
///
/// Le flux existe avant que la moindre donnée n'arrive ; la liaison avec
/// une tâche réseau est faite ensuite par le dispatcher de la session.
pub struct NetworkDataStream {
    id: StreamId,
    cancelled: AtomicBool,
    session: mpsc::WeakUnboundedSender<SessionEvent>,
    sender: mpsc::UnboundedSender<StreamEvent>,
    receiver: Guarded<Option<mpsc::UnboundedReceiver<StreamEvent>>>,
    response: Guarded<Option<ResponseInfo>>,
}

impl NetworkDataStream {
    pub(crate) fn new(session: mpsc::WeakUnboundedSender<SessionEvent>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            id: StreamId::next(),
            cancelled: AtomicBool::new(false),
            session,
            sender,
            receiver: Guarded::new(Some(receiver)),
            response: Guarded::new(None),
        }
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    /// Annule le flux. Avant liaison, aucune tâche réseau ne sera créée.
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        trace!(stream = %self.id, "Cancelling stream");
        if let Some(session) = self.session.upgrade() {
            let _ = session.send(SessionEvent::Cancel(self.id));
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Réponse initiale, une fois reçue
    pub fn response(&self) -> Option<ResponseInfo> {
        self.response.get()
    }

    /// Récepteur des événements ; ne peut être pris qu'une fois
    pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<StreamEvent>> {
        self.receiver.write(Option::take)
    }

    pub(crate) fn deliver(&self, event: StreamEvent) {
        if let StreamEvent::Response(info) = &event {
            self.response.replace(Some(info.clone()));
        }
        let _ = self.sender.send(event);
    }
}

impl fmt::Debug for NetworkDataStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkDataStream")
            .field("id", &self.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
