//! Content-addressed deduplication engine.
//!
//! Uploads are fingerprinted while they stream in. The first upload of a
//! given content persists a physical blob; every later one only adds a
//! logical record pointing at it.

pub mod clock;
pub mod coordinator;
pub mod error;
pub mod locks;
pub mod model;
pub mod registry;
pub mod stats;

pub use clock::{Clock, IdGenerator, RecordStamper, SystemClock, UuidV7};
pub use coordinator::{
    ConfirmRequest, CoordinatorOptions, DedupCoordinator, Download, StagedUpload, UploadMetadata,
    resolve_content_type,
};
pub use error::DedupError;
pub use model::{Confirmation, LogicalRecord, PhysicalBlob, RecordFilter};
pub use registry::{MemoryRegistry, RecordRegistry, SeaOrmRegistry};
pub use stats::StatsSnapshot;
