mod error;
mod fingerprint;
mod traits;

pub mod filesystem;
pub mod memory;

pub use error::StorageError;
pub use fingerprint::{Fingerprint, Fingerprinted, Fingerprinter, spool};
pub use traits::{BlobStore, BoxReader, StoredBlob};
