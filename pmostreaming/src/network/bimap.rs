//! Bijection entre deux ensembles de clés

use std::collections::HashMap;
use std::hash::Hash;

/// Association bidirectionnelle : chaque valeur de gauche correspond à
/// exactement une valeur de droite, et réciproquement.
#[derive(Debug, Clone)]
pub struct BiMap<L, R> {
    left: HashMap<L, R>,
    right: HashMap<R, L>,
}

impl<L, R> Default for BiMap<L, R> {
    fn default() -> Self {
        Self {
            left: HashMap::new(),
            right: HashMap::new(),
        }
    }
}

impl<L, R> BiMap<L, R>
where
    L: Eq + Hash + Clone,
    R: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Insère la paire `(left, right)`, en retirant les paires existantes
    /// qui impliquaient l'une ou l'autre valeur.
    pub fn insert(&mut self, left: L, right: R) {
        self.remove_left(&left);
        self.remove_right(&right);
        self.left.insert(left.clone(), right.clone());
        self.right.insert(right, left);
    }

    pub fn get_by_left(&self, left: &L) -> Option<&R> {
        self.left.get(left)
    }

    pub fn get_by_right(&self, right: &R) -> Option<&L> {
        self.right.get(right)
    }

    /// Retire la paire dont la valeur de gauche est `left`
    pub fn remove_left(&mut self, left: &L) -> Option<R> {
        let right = self.left.remove(left)?;
        self.right.remove(&right);
        Some(right)
    }

    /// Retire la paire dont la valeur de droite est `right`
    pub fn remove_right(&mut self, right: &R) -> Option<L> {
        let left = self.right.remove(right)?;
        self.left.remove(&left);
        Some(left)
    }

    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    pub fn clear(&mut self) {
        self.left.clear();
        self.right.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&L, &R)> {
        self.left.iter()
    }
}
