use std::collections::HashSet;
use std::hash::Hash;

/// Insertion-ordered set: a sequence plus a membership index.
///
/// Inserting a value that is already present keeps its first position.
#[derive(Debug, Clone)]
pub struct OrderedSet<T> {
    items: Vec<T>,
    seen: HashSet<T>,
}

impl<T: Eq + Hash + Clone> OrderedSet<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Append `value` unless present. Returns whether it was added.
    pub fn insert(&mut self, value: T) -> bool {
        if !self.seen.insert(value.clone()) {
            return false;
        }
        self.items.push(value);
        true
    }

    pub fn contains(&self, value: &T) -> bool {
        self.seen.contains(value)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

impl<T: Eq + Hash + Clone> Default for OrderedSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Eq + Hash + Clone> Extend<T> for OrderedSet<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.insert(value);
        }
    }
}

impl<T: Eq + Hash + Clone> FromIterator<T> for OrderedSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<T> IntoIterator for OrderedSet<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_first_position() {
        let mut set = OrderedSet::new();
        assert!(set.insert("b"));
        assert!(set.insert("a"));
        assert!(!set.insert("b"));
        set.extend(["c", "a", "d"]);

        assert_eq!(set.len(), 4);
        assert!(set.contains(&"c"));
        assert_eq!(set.into_vec(), vec!["b", "a", "c", "d"]);
    }

    #[test]
    fn test_from_iterator() {
        let set: OrderedSet<u32> = [3, 1, 3, 2, 1].into_iter().collect();
        assert_eq!(set.iter().copied().collect::<Vec<_>>(), vec![3, 1, 2]);
        assert!(OrderedSet::<u32>::default().is_empty());
    }
}
