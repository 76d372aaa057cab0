pub mod image;
pub mod registry;

pub use layerindex_common::Result;
