//! End-to-end classification of input records.
//!
//! [`classify::Classifier`] runs one pass:
//!
//! 1. parse every record with the capture specification (in parallel)
//! 2. resolve taxon names, item IDs and lineages in batches of distinct keys
//! 3. merge each record's lineage into a fresh taxon tree, in input order
//! 4. bind items to their leaf taxa with [`binder::ItemBinder`]
//!
//! Per-record problems end up in a [`classify::BatchReport`] that is logged once
//! at the end of the pass.

pub mod binder;
pub mod classify;
