//! Diffuseur multi-abonnés isolé dans une tâche (modèle acteur)
//!
//! Le registre des abonnés appartient à une unique tâche tokio. Toutes les
//! opérations (abonnement, désabonnement, diffusion) lui parviennent sous
//! forme de commandes dans une file, ce qui les sérialise sans verrou
//! partagé sur le registre.
//!
//! Chaque abonnement possède son propre tampon, borné selon une
//! [`BufferingPolicy`]. Par défaut seule la valeur la plus récente est
//! conservée : un abonné lent ne bloque jamais le producteur.

use futures_util::Stream;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot, Notify};
use tracing::trace;
use uuid::Uuid;

use crate::lock::acquire;

/// Politique de mise en tampon d'un abonnement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferingPolicy {
    /// Tout conserver
    Unbounded,
    /// Conserver les `n` valeurs les plus récentes (les plus anciennes sont écrasées)
    BufferingNewest(usize),
    /// Conserver les `n` premières valeurs (les suivantes sont ignorées)
    BufferingOldest(usize),
}

impl Default for BufferingPolicy {
    fn default() -> Self {
        BufferingPolicy::BufferingNewest(1)
    }
}

struct Channel<T> {
    buffer: Mutex<VecDeque<T>>,
    policy: BufferingPolicy,
    notify: Notify,
    closed: AtomicBool,
}

impl<T> Channel<T> {
    fn new(policy: BufferingPolicy) -> Self {
        Self {
            buffer: Mutex::new(VecDeque::new()),
            policy,
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    fn push(&self, value: T) {
        {
            let mut buffer = acquire(&self.buffer);
            match self.policy {
                BufferingPolicy::Unbounded => buffer.push_back(value),
                BufferingPolicy::BufferingNewest(0) | BufferingPolicy::BufferingOldest(0) => {}
                BufferingPolicy::BufferingNewest(limit) => {
                    while buffer.len() >= limit {
                        buffer.pop_front();
                    }
                    buffer.push_back(value);
                }
                BufferingPolicy::BufferingOldest(limit) => {
                    if buffer.len() < limit {
                        buffer.push_back(value);
                    }
                }
            }
        }
        self.notify.notify_one();
    }

    fn pop(&self) -> Option<T> {
        acquire(&self.buffer).pop_front()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

enum Command<T> {
    Subscribe { id: Uuid, channel: Arc<Channel<T>> },
    Unsubscribe(Uuid),
    Send(T),
    Count(oneshot::Sender<usize>),
}

/// Diffuseur de valeurs vers un nombre quelconque d'abonnés.
///
/// Doit être créé depuis un runtime tokio (la tâche acteur y est lancée).
/// Les clones partagent le même acteur ; celui-ci s'arrête quand le dernier
/// clone est détruit, et tous les abonnements se terminent alors.
///
/// # Exemple
///
/// ```
/// use pmoutils::Broadcaster;
///
/// # #[tokio::main]
/// # async fn main() {
/// let broadcaster = Broadcaster::new();
/// let mut values = broadcaster.values();
/// broadcaster.send("state changed");
/// assert_eq!(values.next().await, Some("state changed"));
/// # }
/// ```
pub struct Broadcaster<T> {
    commands: mpsc::UnboundedSender<Command<T>>,
}

impl<T> Clone for Broadcaster<T> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Broadcaster<T> {
    pub fn new() -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_actor(rx));
        Self { commands }
    }

    /// Diffuse une valeur à tous les abonnés enregistrés
    pub fn send(&self, value: T) {
        let _ = self.commands.send(Command::Send(value));
    }

    /// Crée un abonnement avec la politique par défaut (valeur la plus récente)
    pub fn values(&self) -> Subscription<T> {
        self.values_with(BufferingPolicy::default())
    }

    /// Crée un abonnement avec une politique de tampon explicite
    pub fn values_with(&self, policy: BufferingPolicy) -> Subscription<T> {
        let id = Uuid::new_v4();
        let channel = Arc::new(Channel::new(policy));
        if self
            .commands
            .send(Command::Subscribe {
                id,
                channel: channel.clone(),
            })
            .is_err()
        {
            channel.close();
        }
        Subscription {
            id,
            channel,
            commands: self.commands.downgrade(),
        }
    }

    /// Nombre d'abonnés actuellement enregistrés auprès de l'acteur
    pub async fn subscriber_count(&self) -> usize {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Count(tx)).is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

impl<T: Clone + Send + 'static> Default for Broadcaster<T> {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_actor<T: Clone>(mut commands: mpsc::UnboundedReceiver<Command<T>>) {
    let mut subscribers: HashMap<Uuid, Arc<Channel<T>>> = HashMap::new();

    while let Some(command) = commands.recv().await {
        match command {
            Command::Subscribe { id, channel } => {
                trace!(subscriber = %id, "Broadcaster: subscribe");
                subscribers.insert(id, channel);
            }
            Command::Unsubscribe(id) => {
                trace!(subscriber = %id, "Broadcaster: unsubscribe");
                if let Some(channel) = subscribers.remove(&id) {
                    channel.close();
                }
            }
            Command::Send(value) => {
                for channel in subscribers.values() {
                    channel.push(value.clone());
                }
            }
            Command::Count(reply) => {
                let _ = reply.send(subscribers.len());
            }
        }
    }

    for (_, channel) in subscribers.drain() {
        channel.close();
    }
}

/// Abonnement à un [`Broadcaster`].
///
/// Consommé paresseusement via [`Subscription::next`] ou
/// [`Subscription::into_stream`]. Sa destruction le désinscrit.
pub struct Subscription<T> {
    id: Uuid,
    channel: Arc<Channel<T>>,
    commands: mpsc::WeakUnboundedSender<Command<T>>,
}

impl<T> Subscription<T> {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Attend la prochaine valeur ; `None` quand le diffuseur a disparu
    pub async fn next(&mut self) -> Option<T> {
        loop {
            if let Some(value) = self.channel.pop() {
                return Some(value);
            }
            if self.channel.is_closed() {
                return None;
            }
            self.channel.notify.notified().await;
        }
    }

    /// Valeur déjà disponible, sans attendre
    pub fn try_next(&mut self) -> Option<T> {
        self.channel.pop()
    }

    /// Convertit l'abonnement en `Stream`
    pub fn into_stream(self) -> impl Stream<Item = T> {
        futures_util::stream::unfold(self, |mut subscription| async move {
            subscription
                .next()
                .await
                .map(|value| (value, subscription))
        })
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(commands) = self.commands.upgrade() {
            let _ = commands.send(Command::Unsubscribe(self.id));
        }
    }
}
