//! Isolated databases for tests that need several connections to the same data.
//!
//! ```
//! use mlmd_store::MetadataStore;
//! use mlmd_test::store::TestDatabase;
//!
//! let database = TestDatabase::new();
//! let store = database.connect();
//! assert!(store.get_types(mlmd_store::TypeKind::Artifact).unwrap().is_empty());
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use mlmd_store::{BoxedStore, ConnectionConfig};

static NEXT_DATABASE: AtomicU64 = AtomicU64::new(0);

/// A uniquely named in-memory database, dropped together with this handle.
///
/// Tests run in parallel within one process, so every test gets its own name to keep the shared
/// database registry from leaking data between tests.
#[derive(Debug)]
pub struct TestDatabase {
    config: ConnectionConfig,
}

impl TestDatabase {
    /// Creates a new, empty database with a name unique to this process.
    pub fn new() -> Self {
        let id = NEXT_DATABASE.fetch_add(1, Ordering::Relaxed);
        let config = ConnectionConfig::InMemory {
            name: format!("test-database-{}-{id}", std::process::id()),
        };
        Self { config }
    }

    /// Returns the connection config pointing at this database.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Opens a new connection to this database.
    pub fn connect(&self) -> BoxedStore {
        mlmd_store::connect(&self.config).expect("in-memory connections cannot fail")
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TestDatabase {
    fn drop(&mut self) {
        if let ConnectionConfig::InMemory { name } = &self.config {
            mlmd_store::drop_database(name);
        }
    }
}
