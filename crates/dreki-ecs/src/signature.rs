//! # Signature — The Set of Component Types of an Archetype
//!
//! A [`Signature`] is an immutable, sorted, duplicate-free list of
//! [`ComponentIndex`]es. Sorting makes `(A, B)` and `(B, A)` the same key, so
//! signatures can be hashed and compared directly, and every set operation is
//! a linear merge over two sorted slices.
//!
//! ```text
//! archetype  [#0 #2 #3 #7]
//! view       [   #2    #7]   contains → true
//! excluded   [#1       #5]   disjoint → true
//! ```

use std::fmt;

use crate::bundle::ComponentSet;
use crate::registry::{ComponentIndex, ComponentRegistry};

/// Sorted, duplicate-free set of component indices.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Signature {
    indices: Vec<ComponentIndex>,
}

impl Signature {
    /// The empty signature.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a signature from indices in any order; duplicates collapse.
    pub fn from_indices(indices: impl IntoIterator<Item = ComponentIndex>) -> Self {
        let mut indices: Vec<_> = indices.into_iter().collect();
        indices.sort_unstable();
        indices.dedup();
        Self { indices }
    }

    /// Signature of a tuple of component types, independent of tuple order.
    ///
    /// # Panics
    ///
    /// Panics if any of the types is unregistered.
    pub fn of<S: ComponentSet>(registry: &ComponentRegistry) -> Self {
        Self::from_indices(S::type_ids().into_iter().map(|t| registry.index_of(t)))
    }

    pub fn indices(&self) -> &[ComponentIndex] {
        &self.indices
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = ComponentIndex> + '_ {
        self.indices.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Whether `index` is part of this signature.
    pub fn has(&self, index: ComponentIndex) -> bool {
        self.indices.binary_search(&index).is_ok()
    }

    /// Position of `index` within the sorted list. Archetypes keep their
    /// pools in the same order, so this is also the pool slot.
    pub fn position(&self, index: ComponentIndex) -> Option<usize> {
        self.indices.binary_search(&index).ok()
    }

    /// True iff every type of `other` is also in `self`.
    pub fn contains(&self, other: &Signature) -> bool {
        if other.len() > self.len() {
            return false;
        }
        let mut mine = self.indices.iter();
        'outer: for needle in &other.indices {
            while let Some(&candidate) = mine.next() {
                if candidate == *needle {
                    continue 'outer;
                }
                if candidate > *needle {
                    return false;
                }
            }
            return false;
        }
        true
    }

    /// True iff the two signatures share no type.
    pub fn is_disjoint(&self, other: &Signature) -> bool {
        let (mut i, mut j) = (0, 0);
        while i < self.indices.len() && j < other.indices.len() {
            match self.indices[i].cmp(&other.indices[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => return false,
            }
        }
        true
    }

    /// This signature plus `index`.
    pub fn with(&self, index: ComponentIndex) -> Signature {
        let mut indices = self.indices.clone();
        if let Err(pos) = indices.binary_search(&index) {
            indices.insert(pos, index);
        }
        Self { indices }
    }

    /// This signature minus `index`.
    pub fn without(&self, index: ComponentIndex) -> Signature {
        let mut indices = self.indices.clone();
        if let Ok(pos) = indices.binary_search(&index) {
            indices.remove(pos);
        }
        Self { indices }
    }

    pub fn union(&self, other: &Signature) -> Signature {
        Self::from_indices(self.iter().chain(other.iter()))
    }

    pub fn intersection(&self, other: &Signature) -> Signature {
        Self {
            indices: self.iter().filter(|&i| other.has(i)).collect(),
        }
    }

    /// True iff the supplied list, taken as a multiset, is exactly this
    /// signature's type set: same length, no duplicates, nothing foreign.
    ///
    /// Used once per entity creation to validate a raw component list before
    /// an archetype is chosen.
    pub fn matches_components_unsorted(&self, supplied: &[ComponentIndex]) -> bool {
        if supplied.len() != self.len() {
            return false;
        }
        let Some(max) = self.max_component_type() else {
            return true;
        };
        let mut seen = vec![0u64; max.index() / 64 + 1];
        for &index in supplied {
            if index > max || !self.has(index) {
                return false;
            }
            let (word, bit) = (index.index() / 64, index.index() % 64);
            if seen[word] & (1u64 << bit) != 0 {
                return false;
            }
            seen[word] |= 1u64 << bit;
        }
        true
    }

    /// Largest index present.
    pub fn max_component_type(&self) -> Option<ComponentIndex> {
        self.indices.last().copied()
    }

    /// Reflection names of the types, in signature order.
    pub fn names<'r>(&self, registry: &'r ComponentRegistry) -> Vec<&'r str> {
        self.iter().map(|i| registry.info(i).name()).collect()
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.indices.iter()).finish()
    }
}

impl FromIterator<ComponentIndex> for Signature {
    fn from_iter<I: IntoIterator<Item = ComponentIndex>>(iter: I) -> Self {
        Self::from_indices(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sig(raw: &[usize]) -> Signature {
        Signature::from_indices(raw.iter().map(|&i| ComponentIndex::new(i)))
    }

    fn idx(raw: &[usize]) -> Vec<ComponentIndex> {
        raw.iter().map(|&i| ComponentIndex::new(i)).collect()
    }

    struct B;
    struct C;
    struct D;

    #[test]
    fn of_is_order_independent() {
        let mut registry = ComponentRegistry::new();
        registry.register_set::<(B, C, D)>();
        assert_eq!(
            Signature::of::<(B, C)>(&registry),
            Signature::of::<(C, B)>(&registry)
        );
        assert_ne!(
            Signature::of::<(B, C)>(&registry),
            Signature::of::<(B, D)>(&registry)
        );
    }

    #[test]
    fn contains_subsets() {
        let a = sig(&[0, 2, 3, 7]);
        assert!(a.contains(&sig(&[2, 7])));
        assert!(a.contains(&a));
        assert!(a.contains(&Signature::empty()));
        assert!(!a.contains(&sig(&[1])));
        assert!(!a.contains(&sig(&[7, 8])));
        assert!(!sig(&[2]).contains(&a));
    }

    #[test]
    fn disjoint() {
        assert!(sig(&[0, 2]).is_disjoint(&sig(&[1, 3])));
        assert!(!sig(&[0, 2]).is_disjoint(&sig(&[2, 3])));
        assert!(sig(&[]).is_disjoint(&sig(&[1])));
    }

    #[test]
    fn with_and_without() {
        let s = sig(&[1, 5]);
        assert_eq!(s.with(ComponentIndex::new(3)), sig(&[1, 3, 5]));
        assert_eq!(s.with(ComponentIndex::new(5)), s);
        assert_eq!(s.without(ComponentIndex::new(1)), sig(&[5]));
        assert_eq!(s.without(ComponentIndex::new(9)), s);
    }

    #[test]
    fn union_and_intersection() {
        assert_eq!(sig(&[1, 4]).union(&sig(&[2, 4])), sig(&[1, 2, 4]));
        assert_eq!(sig(&[1, 4]).intersection(&sig(&[2, 4])), sig(&[4]));
    }

    #[test]
    fn matches_components_unsorted() {
        let s = sig(&[1, 3, 64]);
        assert!(s.matches_components_unsorted(&idx(&[64, 1, 3])));
        assert!(!s.matches_components_unsorted(&idx(&[1, 3])));
        assert!(!s.matches_components_unsorted(&idx(&[1, 1, 3])));
        assert!(!s.matches_components_unsorted(&idx(&[1, 3, 65])));
        assert!(!s.matches_components_unsorted(&idx(&[1, 2, 64])));
        assert!(Signature::empty().matches_components_unsorted(&[]));
    }

    #[test]
    fn max_component_type() {
        assert_eq!(sig(&[4, 9, 2]).max_component_type(), Some(ComponentIndex::new(9)));
        assert_eq!(Signature::empty().max_component_type(), None);
    }

    proptest! {
        #[test]
        fn permutation_yields_same_signature(
            (list, shuffled) in proptest::collection::vec(0usize..48, 0..12)
                .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()))
        ) {
            prop_assert_eq!(sig(&list), sig(&shuffled));
        }

        #[test]
        fn contains_iff_subset(
            a in proptest::collection::vec(0usize..24, 0..10),
            b in proptest::collection::vec(0usize..24, 0..10),
        ) {
            let (sa, sb) = (sig(&a), sig(&b));
            let subset = b.iter().all(|x| a.contains(x));
            prop_assert_eq!(sa.contains(&sb), subset);
            prop_assert!(sa.contains(&sa));
            prop_assert_eq!(sa.is_disjoint(&sb), !b.iter().any(|x| a.contains(x)));
        }

        #[test]
        fn shuffled_components_match(
            list in proptest::collection::vec(0usize..96, 0..12)
                .prop_map(|mut v| { v.sort_unstable(); v.dedup(); v })
                .prop_shuffle()
        ) {
            prop_assert!(sig(&list).matches_components_unsorted(&idx(&list)));
        }
    }
}
