use super::models::{normalize_text, NewQuote, Quote, QuoteId};
use super::QuoteStore;
use crate::error::Error;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Inner {
    quotes: BTreeMap<QuoteId, Quote>,
    next_id: i64,
}

/// Process-local quote store. Deletions are staged on a copy and swapped in
/// only when the whole batch succeeds.
#[derive(Default)]
pub struct InMemoryQuoteStore {
    inner: Mutex<Inner>,
    fail_next_delete: AtomicBool,
}

impl InMemoryQuoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, Error> {
        self.inner
            .lock()
            .map_err(|e| Error::Other(format!("quote store lock poisoned: {}", e)))
    }

    pub fn insert(&self, quote: NewQuote) -> Result<Quote, Error> {
        let mut inner = self.lock()?;
        inner.next_id += 1;
        let stored = Quote {
            id: QuoteId(inner.next_id),
            text: normalize_text(&quote.text),
            author: quote.author.trim().to_string(),
            language: quote.language,
            category: quote.category,
            source: quote.source,
            verified: false,
            sentiment: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        inner.quotes.insert(stored.id, stored.clone());
        Ok(stored)
    }

    pub fn get(&self, id: QuoteId) -> Result<Option<Quote>, Error> {
        Ok(self.lock()?.quotes.get(&id).cloned())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|inner| inner.quotes.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make the next delete abort after staging its first removal.
    pub fn fail_next_delete(&self) {
        self.fail_next_delete.store(true, Ordering::SeqCst);
    }
}

impl QuoteStore for InMemoryQuoteStore {
    fn list_all(&self) -> Result<Vec<Quote>, Error> {
        Ok(self.lock()?.quotes.values().cloned().collect())
    }

    fn exists(&self, id: QuoteId) -> Result<bool, Error> {
        Ok(self.lock()?.quotes.contains_key(&id))
    }

    fn delete_many(&self, ids: &BTreeSet<QuoteId>) -> Result<usize, Error> {
        let mut inner = self.lock()?;
        self.delete_staged(&mut inner, ids.iter())
    }

    fn delete_keeping(&self, primary: QuoteId, ids: &BTreeSet<QuoteId>) -> Result<usize, Error> {
        let mut inner = self.lock()?;
        if !inner.quotes.contains_key(&primary) {
            return Err(Error::NotFound(primary));
        }
        self.delete_staged(&mut inner, ids.iter().filter(|id| **id != primary))
    }
}

impl InMemoryQuoteStore {
    fn delete_staged<'a>(
        &self,
        inner: &mut Inner,
        ids: impl Iterator<Item = &'a QuoteId>,
    ) -> Result<usize, Error> {
        let mut staged = inner.quotes.clone();
        let mut deleted = 0;

        for id in ids {
            if staged.remove(id).is_some() {
                deleted += 1;
                if self.fail_next_delete.swap(false, Ordering::SeqCst) {
                    return Err(Error::StoreTransaction(format!(
                        "injected failure while deleting quote {}",
                        id
                    )));
                }
            }
        }

        inner.quotes = staged;
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::models::Language;

    #[test]
    fn test_insert_assigns_increasing_ids() {
        let store = InMemoryQuoteStore::new();
        let a = store.insert(NewQuote::new("A", "X", Language::En)).unwrap();
        let b = store.insert(NewQuote::new("B", "Y", Language::Es)).unwrap();
        assert!(a.id < b.id);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_failed_delete_leaves_store_untouched() {
        let store = InMemoryQuoteStore::new();
        let ids: BTreeSet<QuoteId> = (0..3)
            .map(|i| store.insert(NewQuote::new(&format!("q{}", i), "a", Language::En)).unwrap().id)
            .collect();

        store.fail_next_delete();
        let err = store.delete_many(&ids).unwrap_err();
        assert!(matches!(err, Error::StoreTransaction(_)));
        assert_eq!(store.len(), 3);

        // Flag is one-shot.
        assert_eq!(store.delete_many(&ids).unwrap(), 3);
        assert!(store.is_empty());
    }

    #[test]
    fn test_delete_keeping_requires_and_spares_primary() {
        let store = InMemoryQuoteStore::new();
        let ids: Vec<QuoteId> = (0..3)
            .map(|i| store.insert(NewQuote::new(&format!("q{}", i), "a", Language::En)).unwrap().id)
            .collect();
        let all: BTreeSet<QuoteId> = ids.iter().copied().collect();

        assert!(matches!(
            store.delete_keeping(QuoteId(99), &all),
            Err(Error::NotFound(QuoteId(99)))
        ));
        assert_eq!(store.len(), 3);

        assert_eq!(store.delete_keeping(ids[1], &all).unwrap(), 2);
        assert!(store.exists(ids[1]).unwrap());
        assert_eq!(store.len(), 1);
    }
}
