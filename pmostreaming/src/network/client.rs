//! Multiplexeur tâches réseau ↔ flux logiques
//!
//! Une session = un `reqwest::Client`. Chaque flux demandé donne lieu à une
//! tâche tokio (la « tâche réseau ») identifiée par un [`TaskId`]. Toutes les
//! notifications de la session (liaison, réponse, données, fin, annulation)
//! passent par une file unique vidée par un seul dispatcher : pour une tâche
//! donnée, l'ordre des événements est préservé.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures_util::StreamExt;
use pmoutils::Guarded;
use reqwest::header::{HeaderName, HeaderValue, RANGE};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::bimap::BiMap;
use super::stream::{NetworkDataStream, ResponseInfo, StreamEvent, StreamId, StreamRequest};
use crate::config_ext::StreamingSettings;
use crate::error::{NetworkError, Result};

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// En-tête demandant l'insertion des métadonnées ICY dans le corps
pub const ICY_METADATA_HEADER: &str = "icy-metadata";

/// Identifiant d'une tâche réseau
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Notifications traitées en série par le dispatcher
pub(crate) enum SessionEvent {
    Bind {
        stream: Arc<NetworkDataStream>,
        request: StreamRequest,
    },
    Response {
        task: TaskId,
        info: ResponseInfo,
    },
    Data {
        task: TaskId,
        chunk: Bytes,
    },
    Complete {
        task: TaskId,
        result: std::result::Result<(), NetworkError>,
    },
    Cancel(StreamId),
}

#[derive(Default)]
struct ClientState {
    bindings: BiMap<TaskId, StreamId>,
    streams: HashMap<StreamId, Arc<NetworkDataStream>>,
    tasks: HashMap<TaskId, CancellationToken>,
    invalidated: bool,
}

impl ClientState {
    fn unbind_task(&mut self, task: TaskId) -> Option<Arc<NetworkDataStream>> {
        let stream_id = self.bindings.remove_left(&task)?;
        if let Some(token) = self.tasks.remove(&task) {
            token.cancel();
        }
        self.streams.remove(&stream_id)
    }

    fn unbind_stream(&mut self, stream: StreamId) -> Option<Arc<NetworkDataStream>> {
        let task = *self.bindings.get_by_right(&stream)?;
        self.unbind_task(task)
    }
}

struct Shared {
    http: reqwest::Client,
    state: Guarded<ClientState>,
}

/// Client réseau possédant la session HTTP et la table tâche ↔ flux.
///
/// Doit être créé depuis un runtime tokio : le dispatcher y est lancé, et
/// les sources de la session y lancent leurs tâches depuis n'importe quel thread.
pub struct NetworkingClient {
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<SessionEvent>,
    runtime: Handle,
}

impl NetworkingClient {
    /// Crée une session à partir des réglages de streaming
    pub fn new(settings: &StreamingSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(NetworkError::from)?;
        Ok(Self::with_http(http))
    }

    /// Crée une session autour d'un client HTTP existant
    pub fn with_http(http: reqwest::Client) -> Self {
        let shared = Arc::new(Shared {
            http,
            state: Guarded::new(ClientState::default()),
        });
        let (commands, receiver) = mpsc::unbounded_channel();
        let runtime = Handle::current();
        runtime.spawn(dispatch(shared.clone(), commands.downgrade(), receiver));
        Self {
            shared,
            commands,
            runtime,
        }
    }

    /// Runtime sur lequel tourne la session
    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    /// Crée un flux logique pour `request`.
    ///
    /// Le flux est retourné immédiatement ; la tâche réseau est créée et
    /// liée par le dispatcher, sauf si le flux a été annulé entre-temps.
    pub fn stream(&self, request: StreamRequest) -> Arc<NetworkDataStream> {
        let stream = Arc::new(NetworkDataStream::new(self.commands.downgrade()));
        debug!(stream = %stream.id(), url = %request.url, "Requesting stream");
        let bind = SessionEvent::Bind {
            stream: stream.clone(),
            request,
        };
        if self.commands.send(bind).is_err() {
            stream.deliver(StreamEvent::Complete(Err(NetworkError::Invalidated)));
        }
        stream
    }

    /// Délie et oublie le flux ; sa tâche éventuelle est annulée.
    /// Sans effet si le flux n'est pas lié.
    pub fn remove(&self, stream: &NetworkDataStream) {
        let removed = self
            .shared
            .state
            .write(|state| state.unbind_stream(stream.id()));
        if removed.is_some() {
            trace!(stream = %stream.id(), "Stream removed");
        }
    }

    /// Flux lié à `task`
    pub fn data_stream(&self, task: TaskId) -> Option<Arc<NetworkDataStream>> {
        self.shared.state.read(|state| {
            let stream_id = state.bindings.get_by_left(&task)?;
            state.streams.get(stream_id).cloned()
        })
    }

    /// Tâche liée à `stream`
    pub fn session_task(&self, stream: StreamId) -> Option<TaskId> {
        self.shared
            .state
            .read(|state| state.bindings.get_by_right(&stream).copied())
    }

    /// Nombre de paires tâche ↔ flux actives
    pub fn active_streams(&self) -> usize {
        self.shared.state.read(|state| state.bindings.len())
    }

    pub fn is_invalidated(&self) -> bool {
        self.shared.state.read(|state| state.invalidated)
    }

    /// Refuse toute nouvelle liaison ; les tâches en cours se terminent
    pub fn finish_tasks_and_invalidate(&self) {
        self.shared.state.write(|state| state.invalidated = true);
        debug!("Session invalidated, running tasks will finish");
    }

    /// Refuse toute nouvelle liaison et annule les tâches en cours
    pub fn invalidate_and_cancel(&self) {
        let cancelled: Vec<_> = self.shared.state.write(|state| {
            state.invalidated = true;
            let tasks: Vec<TaskId> = state.tasks.keys().copied().collect();
            tasks
                .into_iter()
                .filter_map(|task| state.unbind_task(task))
                .collect()
        });
        debug!(cancelled = cancelled.len(), "Session invalidated and cancelled");
        for stream in cancelled {
            stream.deliver(StreamEvent::Complete(Err(NetworkError::Cancelled)));
        }
    }
}

impl Drop for NetworkingClient {
    fn drop(&mut self) {
        self.finish_tasks_and_invalidate();
    }
}

impl fmt::Debug for NetworkingClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkingClient")
            .field("active_streams", &self.active_streams())
            .field("invalidated", &self.is_invalidated())
            .finish()
    }
}

/// Boucle du dispatcher : une notification à la fois
async fn dispatch(
    shared: Arc<Shared>,
    commands: mpsc::WeakUnboundedSender<SessionEvent>,
    mut receiver: mpsc::UnboundedReceiver<SessionEvent>,
) {
    while let Some(event) = receiver.recv().await {
        match event {
            SessionEvent::Bind { stream, request } => bind(&shared, &commands, stream, request),
            SessionEvent::Response { task, info } => {
                if let Some(stream) = lookup(&shared, task) {
                    stream.deliver(StreamEvent::Response(info));
                }
            }
            SessionEvent::Data { task, chunk } => {
                if let Some(stream) = lookup(&shared, task) {
                    stream.deliver(StreamEvent::Data(chunk));
                }
            }
            SessionEvent::Complete { task, result } => {
                let stream = shared.state.write(|state| state.unbind_task(task));
                if let Some(stream) = stream {
                    trace!(%task, stream = %stream.id(), ok = result.is_ok(), "Task completed");
                    stream.deliver(StreamEvent::Complete(result));
                }
            }
            SessionEvent::Cancel(stream_id) => {
                let stream = shared.state.write(|state| state.unbind_stream(stream_id));
                if let Some(stream) = stream {
                    stream.deliver(StreamEvent::Complete(Err(NetworkError::Cancelled)));
                }
            }
        }
    }
    trace!("Session dispatcher stopped");
}

fn lookup(shared: &Shared, task: TaskId) -> Option<Arc<NetworkDataStream>> {
    shared.state.read(|state| {
        let stream_id = state.bindings.get_by_left(&task)?;
        state.streams.get(stream_id).cloned()
    })
}

fn bind(
    shared: &Shared,
    commands: &mpsc::WeakUnboundedSender<SessionEvent>,
    stream: Arc<NetworkDataStream>,
    request: StreamRequest,
) {
    let Some(events) = commands.upgrade() else {
        stream.deliver(StreamEvent::Complete(Err(NetworkError::Invalidated)));
        return;
    };

    let bound = shared.state.write(|state| {
        if stream.is_cancelled() {
            return Err(NetworkError::Cancelled);
        }
        if state.invalidated {
            return Err(NetworkError::Invalidated);
        }
        let task = TaskId::next();
        let token = CancellationToken::new();
        state.bindings.insert(task, stream.id());
        state.streams.insert(stream.id(), stream.clone());
        state.tasks.insert(task, token.clone());
        Ok((task, token))
    });

    match bound {
        Ok((task, token)) => {
            debug!(%task, stream = %stream.id(), url = %request.url, "Stream bound");
            tokio::spawn(run_task(shared.http.clone(), request, task, token, events));
        }
        Err(err) => {
            debug!(stream = %stream.id(), error = %err, "Stream not bound");
            stream.deliver(StreamEvent::Complete(Err(err)));
        }
    }
}

async fn run_task(
    http: reqwest::Client,
    request: StreamRequest,
    task: TaskId,
    token: CancellationToken,
    events: mpsc::UnboundedSender<SessionEvent>,
) {
    let result = tokio::select! {
        _ = token.cancelled() => Err(NetworkError::Cancelled),
        result = transfer(&http, request, task, &events) => result,
    };
    if let Err(err) = &result {
        if !matches!(err, NetworkError::Cancelled) {
            warn!(%task, error = %err, "Network task failed");
        }
    }
    let _ = events.send(SessionEvent::Complete { task, result });
}

async fn transfer(
    http: &reqwest::Client,
    request: StreamRequest,
    task: TaskId,
    events: &mpsc::UnboundedSender<SessionEvent>,
) -> std::result::Result<(), NetworkError> {
    let mut headers = request.headers;
    headers
        .entry(HeaderName::from_static(ICY_METADATA_HEADER))
        .or_insert(HeaderValue::from_static("1"));
    if let Some(start) = request.range_start {
        if let Ok(value) = HeaderValue::from_str(&format!("bytes={start}-")) {
            headers.insert(RANGE, value);
        }
    }

    let response = http.get(request.url).headers(headers).send().await?;
    let status = response.status();
    let info = ResponseInfo::new(status.as_u16(), response.headers().clone());
    let _ = events.send(SessionEvent::Response { task, info });

    if !status.is_success() {
        return Err(NetworkError::ServerError {
            status: status.as_u16(),
        });
    }

    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        if chunk.is_empty() {
            continue;
        }
        if events.send(SessionEvent::Data { task, chunk }).is_err() {
            break;
        }
    }
    Ok(())
}
