pub mod memory;
pub mod models;
mod queries;
mod sqlite;

pub use memory::InMemoryQuoteStore;
pub use sqlite::Database;

use crate::error::Error;
use models::{Quote, QuoteId};
use std::collections::BTreeSet;

/// The store contract the scanner and merge coordinator depend on.
///
/// `delete_many` must be all-or-nothing: either every listed row that exists
/// is removed, or the store is left exactly as it was. Ids that do not exist
/// are skipped without error.
pub trait QuoteStore {
    fn list_all(&self) -> Result<Vec<Quote>, Error>;
    fn exists(&self, id: QuoteId) -> Result<bool, Error>;
    /// Returns the number of rows actually removed.
    fn delete_many(&self, ids: &BTreeSet<QuoteId>) -> Result<usize, Error>;
    /// Like `delete_many`, but inside the same transaction first confirms
    /// that `primary` exists and never deletes it. A missing primary fails
    /// with `Error::NotFound` before anything is removed.
    fn delete_keeping(&self, primary: QuoteId, ids: &BTreeSet<QuoteId>) -> Result<usize, Error>;
}
