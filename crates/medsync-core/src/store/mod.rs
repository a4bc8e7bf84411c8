// ── In-memory entity state ──

mod collection;
mod data_store;

pub(crate) use collection::EntityCollection;
pub use data_store::DataStore;
pub(crate) use data_store::Stored;
