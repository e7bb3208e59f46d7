//! Placedoc Storage Library
//!
//! This crate provides the storage abstraction over the three areas (pending,
//! archive, reject) and its `object_store` implementation.
//!
//! # Storage key format
//!
//! Keys are relative to the area's container root and identical in every area:
//!
//! - **File**: `{department}/{directory}/{roll_number}/{file_name}`
//! - **Directory placeholder**: `{department}/{directory}/` (zero bytes)
//!
//! Key generation is centralized in the `keys` module so every caller stays consistent.

pub mod factory;
pub mod keys;
pub mod object_store_backend;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use object_store_backend::ObjectStoreStorage;
pub use placedoc_core::StorageBackend;
pub use traits::{
    ByteStream, CopyId, CopyState, ObjectProperties, Storage, StorageError, StorageResult,
};
