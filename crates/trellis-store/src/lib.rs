//! Trellis Store — the property-graph store interface and adapters

pub mod memory;
pub mod persist;
pub mod store;


pub use memory::MemoryStore;
pub use persist::{
    CommitStats, DEFAULT_CHUNK_SIZE, PersistenceAdapter, STREAMING_FILE_THRESHOLD,
};
pub use store::GraphStore;
