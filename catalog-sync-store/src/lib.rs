//! # Catalog Sync Store
//!
//! Boundary to the primary store that owns listings, threads and user
//! profiles. The sync pipeline reads entities through `PrimaryStore`, writes
//! back only the trending flag, and learns about committed mutations from the
//! `ChangeEvent` after-commit hook.

pub mod catalog;
pub mod errors;
pub mod events;
pub mod interfaces;
pub mod memory;

pub use catalog::{CatalogExport, Category};
pub use errors::StoreError;
pub use events::ChangeEvent;
pub use interfaces::PrimaryStore;
pub use memory::MemoryStore;
