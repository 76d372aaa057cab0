pub mod digest;
pub mod key;
pub mod metadata;
pub mod reference;
pub mod store;

pub use digest::{Digest, DigestError};
pub use key::ImageKey;
pub use metadata::{ImageMetadata, LayerMetadata, MetadataIndex};
pub use reference::{ImageReference, ReferenceError};

#[cfg(test)]
mod tests;
