//! File d'attente de lecture avec insertion prioritaire ("skip")
//!
//! `enqueue` place un élément derrière tout ce qui est déjà en attente,
//! `skip` le place devant : c'est la différence entre « lire plus tard »
//! et « lire ensuite ». `dequeue` retire toujours le prochain élément.

use std::collections::VecDeque;

/// File FIFO avec insertion en tête.
///
/// # Exemple
///
/// ```
/// use pmoutils::Queue;
///
/// let mut queue = Queue::new();
/// queue.enqueue("later");
/// queue.skip("next");
/// assert_eq!(queue.dequeue(), Some("next"));
/// assert_eq!(queue.dequeue(), Some("later"));
/// assert_eq!(queue.dequeue(), None);
/// ```
#[derive(Debug, Clone)]
pub struct Queue<T> {
    // L'avant du deque est le prochain élément retourné par `dequeue`
    items: VecDeque<T>,
}

impl<T> Queue<T> {
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    /// Ajoute un élément qui sera retiré après tous ceux déjà présents
    pub fn enqueue(&mut self, item: T) {
        self.items.push_back(item);
    }

    /// Ajoute plusieurs éléments en fin de file, dans l'ordre donné
    pub fn enqueue_all(&mut self, items: impl IntoIterator<Item = T>) {
        self.items.extend(items);
    }

    /// Ajoute un élément qui sera retiré avant tous ceux déjà présents
    pub fn skip(&mut self, item: T) {
        self.items.push_front(item);
    }

    /// Ajoute un lot en tête de file.
    ///
    /// Le lot conserve son ordre interne et passe devant tout le contenu
    /// précédent.
    pub fn skip_all(&mut self, items: impl IntoIterator<Item = T>) {
        let batch: Vec<T> = items.into_iter().collect();
        for item in batch.into_iter().rev() {
            self.items.push_front(item);
        }
    }

    /// Insère un élément à une position donnée (0 = prochain retiré).
    ///
    /// # Panics
    ///
    /// Panique si `index > len()` : c'est une erreur de l'appelant.
    pub fn insert(&mut self, item: T, index: usize) {
        assert!(
            index <= self.items.len(),
            "queue insert index {} out of range (len {})",
            index,
            self.items.len()
        );
        self.items.insert(index, item);
    }

    /// Retire et retourne le prochain élément
    pub fn dequeue(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Consulte le prochain élément sans le retirer
    pub fn peek(&self) -> Option<&T> {
        self.items.front()
    }

    /// Retire tous les éléments satisfaisant le prédicat, retourne le nombre retiré
    pub fn remove_where(&mut self, mut predicate: impl FnMut(&T) -> bool) -> usize {
        let before = self.items.len();
        self.items.retain(|item| !predicate(item));
        before - self.items.len()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Parcourt les éléments dans l'ordre de retrait
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}
