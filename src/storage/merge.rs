//! K-way merge over SSTable iterators
//!
//! Sources are ordered newest first. When several sources hold the same key,
//! the newest entry wins and the older ones are skipped.

use std::iter::Peekable;

use crate::error::Result;
use crate::memtable::Entry;

type Item = Result<(Vec<u8>, Entry)>;

/// Merges sorted sources into one sorted stream of distinct keys
pub struct MergeIter<I: Iterator<Item = Item>> {
    sources: Vec<Peekable<I>>,
}

impl<I: Iterator<Item = Item>> MergeIter<I> {
    /// `sources[0]` is the newest
    pub fn new(sources: Vec<I>) -> Self {
        Self {
            sources: sources.into_iter().map(Iterator::peekable).collect(),
        }
    }
}

impl<I: Iterator<Item = Item>> Iterator for MergeIter<I> {
    type Item = Item;

    fn next(&mut self) -> Option<Self::Item> {
        // Surface the first error seen, or find the smallest key
        let mut smallest: Option<(usize, Vec<u8>)> = None;
        for i in 0..self.sources.len() {
            match self.sources[i].peek() {
                None => continue,
                Some(Err(_)) => return self.sources[i].next(),
                Some(Ok((key, _))) => {
                    let better = match &smallest {
                        None => true,
                        // Strictly less keeps the newest source on ties
                        Some((_, best)) => key < best,
                    };
                    if better {
                        smallest = Some((i, key.clone()));
                    }
                }
            }
        }

        let (winner, key) = smallest?;
        let item = self.sources[winner].next();

        // Drop shadowed versions of the same key from older sources
        for source in self.sources.iter_mut().skip(winner + 1) {
            if let Some(Ok((k, _))) = source.peek() {
                if *k == key {
                    source.next();
                }
            }
        }
        item
    }
}
