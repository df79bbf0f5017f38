//! Deterministic local-disk storage layout for a video run's artifacts.
//!
//! Same method surface as a typical object-store client
//! (`create_*`/`list_*`/`delete_*`/size probing) but targeting `tokio::fs`
//! directly, since this system's storage is an explicit local disk tree,
//! not an object store.

pub mod error;
pub mod layout;
pub mod operations;
pub mod url;

pub use error::{StorageError, StorageResult};
pub use layout::{Quality, StorageLayout};
pub use operations::LocalStorage;
pub use url::PublicUrlMapper;
