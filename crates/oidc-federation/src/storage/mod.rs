//! Statement sources for resolution.
//!
//! - [`memory`]: an in-memory [`Fetcher`](crate::resolve::Fetcher) with
//!   failure injection.
//! - [`statement_store`]: a directory of signed statements, also usable
//!   as a fetcher.

pub mod memory;
pub mod statement_store;

pub use memory::MemoryFetcher;
pub use statement_store::StatementStore;
