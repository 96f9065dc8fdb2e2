//! Token kinds shared by scanners, grammars and parse tables.

use std::fmt::Debug;
use std::hash::Hash;

/// A closed set of token kinds, normally a fieldless enum.
///
/// Grammar definitions refer to kinds by name and parse tables index
/// columns by id. Ids are dense in `0..size()`, and `from_id`/`from_name`
/// invert `to_id`/`to_name`.
pub trait LexemeSet: Clone + Copy + Debug + Eq + Hash {
    fn from_name(name: &str) -> Option<Self>;
    fn from_id(id: u32) -> Option<Self>;
    fn to_name(self) -> &'static str;
    fn to_id(self) -> u32;

    /// Kind with the following id, `None` after the last one.
    fn next(self) -> Option<Self> {
        Self::from_id(self.to_id() + 1)
    }

    /// Every kind in id order.
    fn iter() -> LexemeIterator<Self> {
        LexemeIterator {
            upcoming: Self::from_id(0),
        }
    }

    fn size() -> u32;
}

/// See [`LexemeSet::iter`].
pub struct LexemeIterator<T: LexemeSet> {
    upcoming: Option<T>,
}

impl<T: LexemeSet> Iterator for LexemeIterator<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let current = self.upcoming?;
        self.upcoming = LexemeSet::next(current);
        Some(current)
    }
}
