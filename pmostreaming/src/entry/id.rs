use std::fmt;
use std::hash::{Hash, Hasher};

use uuid::Uuid;

/// Identifiant d'une entrée : l'identifiant fourni par l'appelant (en
/// général l'URL) et un jeton d'unicité interne.
///
/// Égalité et hachage ne portent que sur l'identifiant fourni.
#[derive(Debug, Clone)]
pub struct AudioEntryId {
    pub id: String,
    token: Uuid,
}

impl AudioEntryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            token: Uuid::new_v4(),
        }
    }

    pub fn token(&self) -> Uuid {
        self.token
    }
}

impl PartialEq for AudioEntryId {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for AudioEntryId {}

impl Hash for AudioEntryId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for AudioEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}
