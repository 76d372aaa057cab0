pub mod store;

pub use store::snapshot::JsonSnapshotStore;
