//! Storage backends for graph-sync
//!
//! Documents are read through `DocumentSource` implementations and written
//! through `GraphIndex` implementations. `SqliteGraphIndex` is the primary
//! persistent index; the memory backends serve tests and dry runs.

mod fs;
mod memory;
mod sqlite;
mod traits;

pub use fs::{FsDocumentStore, FsMirrorStore};
pub use memory::{MemoryDocumentStore, MemoryGraphIndex};
pub use sqlite::SqliteGraphIndex;
pub use traits::{OpenStore, StorageError, StorageResult};

pub(crate) use sqlite::index_error;
