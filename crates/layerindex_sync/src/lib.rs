//! Keeps a local, queryable copy of a registry's image layer metadata.
//!
//! The [`Watcher`] polls cheap repository/tag counts and, when they grow,
//! rebuilds the whole index through the [`Aggregator`], swapping it into the
//! shared [`MetadataCache`] and persisting it through a
//! [`SnapshotStore`](layerindex_domain::image::store::SnapshotStore).

pub mod aggregator;
pub mod cache;
pub mod watcher;

#[cfg(test)]
pub(crate) mod fake;

pub use aggregator::Aggregator;
pub use cache::{CacheError, MetadataCache};
pub use watcher::{PollOutcome, Watcher, WatcherConfig, WatcherState, WatcherStatus};
