//! Session réseau et multiplexage des tâches vers les flux logiques

pub mod bimap;
pub mod client;
pub mod stream;

pub use bimap::BiMap;
pub use client::{NetworkingClient, TaskId};
pub use stream::{NetworkDataStream, ResponseInfo, StreamEvent, StreamId, StreamRequest};
