//! Verrou d'exclusion mutuelle avec combinateur `around`

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Verrou exclusif sans valeur associée.
///
/// `around` acquiert le verrou, exécute la closure puis le relâche, y compris
/// si la closure panique : le guard est libéré pendant le déroulement de la
/// pile et l'empoisonnement éventuel est ignoré à l'acquisition suivante.
///
/// # Exemple
///
/// ```
/// use pmoutils::Lock;
///
/// let lock = Lock::new();
/// let value = lock.around(|| 40 + 2);
/// assert_eq!(value, 42);
/// ```
#[derive(Debug, Default)]
pub struct Lock {
    inner: Mutex<()>,
}

impl Lock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exécute `f` en section critique et retourne son résultat
    pub fn around<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = acquire(&self.inner);
        f()
    }
}

/// Acquiert un mutex en ignorant l'empoisonnement
pub(crate) fn acquire<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_around_returns_closure_result() {
        let lock = Lock::new();
        assert_eq!(lock.around(|| "ok"), "ok");
    }

    #[test]
    fn test_lock_released_after_panic() {
        let lock = Lock::new();
        let result = catch_unwind(AssertUnwindSafe(|| {
            lock.around(|| panic!("boom"));
        }));
        assert!(result.is_err());

        // Le verrou doit être à nouveau disponible
        assert_eq!(lock.around(|| 1), 1);
    }

    #[test]
    fn test_around_serializes_threads() {
        let lock = Arc::new(Lock::new());
        let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let inside = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lock = lock.clone();
                let counter = counter.clone();
                let inside = inside.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        lock.around(|| {
                            assert!(!inside.swap(true, std::sync::atomic::Ordering::SeqCst));
                            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                            inside.store(false, std::sync::atomic::Ordering::SeqCst);
                        });
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 800);
    }
}
