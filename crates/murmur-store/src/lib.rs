//! # murmur-store
//!
//! Storage backends for murmur:
//!
//! - PostgreSQL note and credential stores (production)
//! - In-memory note and credential stores (tests, `--memory` mode)
//! - Filesystem and in-memory blob storage
//! - Connection pool management
//!
//! ## Example
//!
//! ```rust,ignore
//! use murmur_store::Database;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/murmur").await?;
//!     let notes = db.notes.list(owner_id).await?;
//!     Ok(())
//! }
//! ```

pub mod blob;
pub mod memory;
pub mod notes;
pub mod pool;
pub mod users;

// Re-export core types
pub use murmur_core::*;

pub use blob::{file_extension, generate_blob_name, FilesystemBlobStore, MemoryBlobStore};
pub use memory::MemoryNoteStore;
pub use notes::PgNoteStore;
pub use pool::{create_pool, create_pool_with_config, PoolConfig};
pub use users::{MemoryCredentialStore, PgCredentialStore};

/// Combined PostgreSQL database context.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::PgPool,
    /// Note store for the record collection.
    pub notes: PgNoteStore,
    /// Credential store for users and access tokens.
    pub credentials: PgCredentialStore,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self {
            notes: PgNoteStore::new(pool.clone()),
            credentials: PgCredentialStore::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }
}
