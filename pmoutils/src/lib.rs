//! # pmoutils
//!
//! Primitives partagées par les crates pmostream :
//!
//! - [`Lock`] : exclusion mutuelle avec le combinateur `around`
//! - [`Guarded`] : valeur protégée, lecture/écriture en section critique
//! - [`Broadcaster`] : diffusion multi-abonnés sérialisée par une tâche acteur
//! - [`Queue`] : file de lecture avec insertion prioritaire
//!
//! ```
//! use pmoutils::{Guarded, Queue};
//!
//! let pending = Guarded::new(Queue::new());
//! pending.write(|queue| queue.enqueue("http://radio.example/stream"));
//! let next = pending.write(|queue| queue.dequeue());
//! assert_eq!(next, Some("http://radio.example/stream"));
//! ```

pub mod broadcaster;
pub mod guarded;
pub mod lock;
pub mod queue;

pub use broadcaster::{Broadcaster, BufferingPolicy, Subscription};
pub use guarded::Guarded;
pub use lock::Lock;
pub use queue::Queue;
