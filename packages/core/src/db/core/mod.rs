mod edges;
mod graphdb;
mod header;
mod index;
mod nodes;
mod pointer_kind;
mod property_index;
mod property_index_persistence;
mod records;
mod transaction_support;
mod traversal;

pub use graphdb::{GraphDB, IntegrityOptions, IntegrityReport};
pub use header::HeaderState;
