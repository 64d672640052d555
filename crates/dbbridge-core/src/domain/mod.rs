//! Domain types
//!
//! - Scalar values and caller-side bind values
//! - Result rows and the cached result payload
//! - Cache profiles and the URL-selected cache backend
//! - Schema introspection records
//! - The error taxonomy

pub mod cache_profile;
pub mod errors;
pub mod row;
pub mod schema;
pub mod value;

// Re-export commonly used types
pub use cache_profile::{CacheBackend, CacheEndpoint, CacheProfile, ProcessCacheFlavor};
pub use errors::{DbError, ErrorInfo};
pub use row::{CachedResult, Row};
pub use schema::{describe_fields, ColumnInfo, FieldDescriptor, IndexInfo, IndexKind, LockMode};
pub use value::{BindValue, SqlValue, NULL_MARKER};
