pub mod firebase;
pub mod memory;
pub mod sqlite;

pub use firebase::FirebaseStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteCache;
