//! Valeur protégée par verrou (lecture / écriture en section critique)

use crate::lock::acquire;
use std::fmt;
use std::sync::Mutex;

/// Boîte atomique autour d'une valeur.
///
/// Toute lecture et toute écriture passent par le verrou. `write` modifie la
/// valeur en place et peut retourner un résultat dérivé dans la **même**
/// section critique.
///
/// # Exemple
///
/// ```
/// use pmoutils::Guarded;
///
/// let counter = Guarded::new(0u32);
/// let previous = counter.write(|value| {
///     let previous = *value;
///     *value += 1;
///     previous
/// });
/// assert_eq!(previous, 0);
/// assert_eq!(counter.read(|value| *value), 1);
/// ```
pub struct Guarded<T> {
    value: Mutex<T>,
}

impl<T> Guarded<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Mutex::new(value),
        }
    }

    /// Lit la valeur sous le verrou
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = acquire(&self.value);
        f(&guard)
    }

    /// Modifie la valeur sous le verrou et retourne un résultat dérivé
    pub fn write<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = acquire(&self.value);
        f(&mut guard)
    }

    /// Remplace la valeur et retourne l'ancienne
    pub fn replace(&self, value: T) -> T {
        self.write(|current| std::mem::replace(current, value))
    }

    pub fn into_inner(self) -> T {
        self.value
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl<T: Clone> Guarded<T> {
    /// Copie de la valeur courante
    pub fn get(&self) -> T {
        self.read(T::clone)
    }
}

impl<T: Default> Default for Guarded<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Guarded<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.read(|value| f.debug_tuple("Guarded").field(value).finish())
    }
}
