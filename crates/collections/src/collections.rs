//! Fast collection types for the aiterm engine.
//!
//! Re-exports `FxHashMap` and `FxHashSet` (faster than std for the small
//! string/uuid keys the engine uses), plus `IndexMap`/`IndexSet` with FxHash
//! for insertion-ordered maps. The session arena relies on insertion order
//! to resolve "activate the preceding session" on close.

pub use rustc_hash::{FxBuildHasher, FxHashMap, FxHashSet};
pub use std::collections::*;

/// Insertion-ordered hash map with FxHash (faster than default hasher).
pub type IndexMap<K, V> = indexmap::IndexMap<K, V, FxBuildHasher>;

/// Insertion-ordered hash set with FxHash.
pub type IndexSet<T> = indexmap::IndexSet<T, FxBuildHasher>;
