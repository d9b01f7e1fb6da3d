use super::models::*;
use super::sqlite::Database;
use super::QuoteStore;
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, OptionalExtension, Result, Row, Transaction};
use std::collections::BTreeSet;
use tracing::debug;

const QUOTE_COLUMNS: &str = "id, text, author, language, category, source, verified, \
     sentiment_positive, sentiment_negative, sentiment_neutral, sentiment_compound, created_at";

fn quote_from_row(row: &Row<'_>) -> Result<Quote> {
    let language: String = row.get(3)?;
    let language = language
        .parse::<Language>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;

    let sentiment = match (
        row.get::<_, Option<f64>>(7)?,
        row.get::<_, Option<f64>>(8)?,
        row.get::<_, Option<f64>>(9)?,
        row.get::<_, Option<f64>>(10)?,
    ) {
        (Some(positive), Some(negative), Some(neutral), Some(compound)) => Some(SentimentScores {
            positive,
            negative,
            neutral,
            compound,
        }),
        _ => None,
    };

    Ok(Quote {
        id: QuoteId(row.get(0)?),
        text: row.get(1)?,
        author: row.get(2)?,
        language,
        category: row.get(4)?,
        source: row.get(5)?,
        verified: row.get(6)?,
        sentiment,
        created_at: row.get(11)?,
    })
}

impl Database {
    // ── Quotes ───────────────────────────────────────────────────

    pub fn insert_quote(&self, quote: &NewQuote) -> Result<Quote> {
        let now = chrono::Utc::now().to_rfc3339();
        let text = normalize_text(&quote.text);
        let author = quote.author.trim();
        self.connection().execute(
            "INSERT INTO quotes (text, author, language, category, source, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                text,
                author,
                quote.language.code(),
                quote.category,
                quote.source,
                now
            ],
        )?;
        let id = QuoteId(self.connection().last_insert_rowid());
        debug!("Inserted quote {}", id);
        Ok(Quote {
            id,
            text,
            author: author.to_string(),
            language: quote.language,
            category: quote.category.clone(),
            source: quote.source.clone(),
            verified: false,
            sentiment: None,
            created_at: now,
        })
    }

    /// Insert a batch of quotes in one transaction.
    pub fn insert_quotes(&self, quotes: &[NewQuote]) -> Result<Vec<QuoteId>> {
        let now = chrono::Utc::now().to_rfc3339();
        let tx = self.connection().unchecked_transaction()?;
        let mut ids = Vec::with_capacity(quotes.len());
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO quotes (text, author, language, category, source, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for quote in quotes {
                stmt.execute(params![
                    normalize_text(&quote.text),
                    quote.author.trim(),
                    quote.language.code(),
                    quote.category,
                    quote.source,
                    now
                ])?;
                ids.push(QuoteId(tx.last_insert_rowid()));
            }
        }
        tx.commit()?;
        debug!("Inserted {} quotes", ids.len());
        Ok(ids)
    }

    pub fn get_quote(&self, id: QuoteId) -> Result<Option<Quote>> {
        self.connection()
            .query_row(
                &format!("SELECT {} FROM quotes WHERE id = ?1", QUOTE_COLUMNS),
                params![id.0],
                quote_from_row,
            )
            .optional()
    }

    /// All quotes in ascending id order.
    pub fn list_quotes(&self) -> Result<Vec<Quote>> {
        let mut stmt = self
            .connection()
            .prepare(&format!("SELECT {} FROM quotes ORDER BY id", QUOTE_COLUMNS))?;
        let quotes = stmt
            .query_map([], quote_from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(quotes)
    }

    pub fn list_quotes_by_language(&self, language: Language) -> Result<Vec<Quote>> {
        self.list_quotes_filtered(&QuoteFilter {
            language: Some(language),
            ..QuoteFilter::default()
        })
    }

    /// Quotes matching `filter`, in ascending id order, paged by offset/limit.
    pub fn list_quotes_filtered(&self, filter: &QuoteFilter) -> Result<Vec<Quote>> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut args: Vec<Value> = Vec::new();

        if let Some(language) = filter.language {
            clauses.push("language = ?");
            args.push(Value::Text(language.code().to_string()));
        }
        match filter.sentiment {
            Some(Sentiment::Positive) => {
                clauses.push("sentiment_compound >= ?");
                args.push(Value::Real(SENTIMENT_CUTOFF));
            }
            Some(Sentiment::Negative) => {
                clauses.push("sentiment_compound <= ?");
                args.push(Value::Real(-SENTIMENT_CUTOFF));
            }
            Some(Sentiment::Neutral) => {
                clauses.push("sentiment_compound > ? AND sentiment_compound < ?");
                args.push(Value::Real(-SENTIMENT_CUTOFF));
                args.push(Value::Real(SENTIMENT_CUTOFF));
            }
            None => {}
        }
        if let Some(author) = &filter.author {
            clauses.push("author LIKE ? ESCAPE '\\'");
            args.push(Value::Text(like_pattern(author)));
        }
        if let Some(verified) = filter.verified {
            clauses.push("verified = ?");
            args.push(Value::Integer(verified as i64));
        }
        if let Some(search) = &filter.search {
            clauses.push("(text LIKE ? ESCAPE '\\' OR author LIKE ? ESCAPE '\\')");
            let pattern = like_pattern(search);
            args.push(Value::Text(pattern.clone()));
            args.push(Value::Text(pattern));
        }

        let mut sql = format!("SELECT {} FROM quotes", QUOTE_COLUMNS);
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY id LIMIT ? OFFSET ?");
        // SQLite treats a negative LIMIT as unbounded.
        args.push(Value::Integer(filter.limit.map_or(-1, |limit| limit as i64)));
        args.push(Value::Integer(filter.offset as i64));

        let mut stmt = self.connection().prepare(&sql)?;
        let quotes = stmt
            .query_map(params_from_iter(args.iter()), quote_from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(quotes)
    }

    /// Exact match on stored text and author. `text` must already be
    /// normalized with `normalize_text`; it is compared as given.
    pub fn find_by_text_author(&self, text: &str, author: &str) -> Result<Option<QuoteId>> {
        self.connection()
            .query_row(
                "SELECT id FROM quotes WHERE text = ?1 AND author = ?2 ORDER BY id LIMIT 1",
                params![text, author.trim()],
                |row| row.get(0).map(QuoteId),
            )
            .optional()
    }

    pub fn quote_exists(&self, id: QuoteId) -> Result<bool> {
        let count: i64 = self.connection().query_row(
            "SELECT COUNT(*) FROM quotes WHERE id = ?1",
            params![id.0],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn count_quotes(&self) -> Result<i64> {
        self.connection()
            .query_row("SELECT COUNT(*) FROM quotes", [], |row| row.get(0))
    }

    pub fn count_by_language(&self) -> Result<Vec<(Language, i64)>> {
        let mut stmt = self.connection().prepare(
            "SELECT language, COUNT(*) FROM quotes GROUP BY language ORDER BY language",
        )?;
        let counts = stmt
            .query_map([], |row| {
                let code: String = row.get(0)?;
                let language = code.parse::<Language>().map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e))
                })?;
                Ok((language, row.get(1)?))
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(counts)
    }

    /// Totals by language, sentiment bucket and verification.
    pub fn statistics(&self) -> Result<QuoteStatistics> {
        let counts: [i64; 6] = self.connection().query_row(
            "SELECT COUNT(*),
                    COUNT(CASE WHEN sentiment_compound >= ?1 THEN 1 END),
                    COUNT(CASE WHEN sentiment_compound <= -?1 THEN 1 END),
                    COUNT(CASE WHEN sentiment_compound > -?1 AND sentiment_compound < ?1 THEN 1 END),
                    COUNT(CASE WHEN sentiment_compound IS NULL THEN 1 END),
                    COUNT(CASE WHEN verified THEN 1 END)
             FROM quotes",
            params![SENTIMENT_CUTOFF],
            |row| {
                Ok([
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ])
            },
        )?;
        let [total_quotes, positive, negative, neutral, unknown, verified_count] = counts;

        let by_language = self
            .count_by_language()?
            .into_iter()
            .map(|(language, count)| (language.code().to_string(), count))
            .collect();

        Ok(QuoteStatistics {
            total_quotes,
            by_language,
            by_sentiment: SentimentCounts {
                positive,
                negative,
                neutral,
                unknown,
            },
            verified_count,
        })
    }

    /// Delete every listed quote inside one transaction. Missing ids are no-ops.
    /// Any failure rolls the whole batch back (the transaction is dropped uncommitted).
    pub fn delete_quotes(&self, ids: &BTreeSet<QuoteId>) -> Result<usize> {
        let tx = self.begin_write()?;
        let deleted = delete_in(&tx, ids.iter())?;
        tx.commit()?;
        debug!("Deleted {} of {} requested quotes", deleted, ids.len());
        Ok(deleted)
    }

    /// Delete `ids` except `primary`, provided `primary` still exists when the
    /// write lock is held. Returns `None` (nothing deleted) when it does not.
    pub fn delete_quotes_keeping(
        &self,
        primary: QuoteId,
        ids: &BTreeSet<QuoteId>,
    ) -> Result<Option<usize>> {
        let tx = self.begin_write()?;
        let found = tx
            .query_row("SELECT 1 FROM quotes WHERE id = ?1", params![primary.0], |_| Ok(()))
            .optional()?;
        if found.is_none() {
            return Ok(None);
        }

        let deleted = delete_in(&tx, ids.iter().filter(|id| **id != primary))?;
        tx.commit()?;
        debug!("Deleted {} quotes, kept {}", deleted, primary);
        Ok(Some(deleted))
    }
}

/// `%needle%` with LIKE wildcards in `needle` escaped by `\`.
fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn delete_in<'a>(tx: &Transaction<'_>, ids: impl Iterator<Item = &'a QuoteId>) -> Result<usize> {
    let mut stmt = tx.prepare_cached("DELETE FROM quotes WHERE id = ?1")?;
    let mut deleted = 0;
    for id in ids {
        deleted += stmt.execute(params![id.0])?;
    }
    Ok(deleted)
}

impl QuoteStore for Database {
    fn list_all(&self) -> std::result::Result<Vec<Quote>, crate::Error> {
        Ok(self.list_quotes()?)
    }

    fn exists(&self, id: QuoteId) -> std::result::Result<bool, crate::Error> {
        Ok(self.quote_exists(id)?)
    }

    fn delete_many(&self, ids: &BTreeSet<QuoteId>) -> std::result::Result<usize, crate::Error> {
        self.delete_quotes(ids)
            .map_err(|e| crate::Error::StoreTransaction(e.to_string()))
    }

    fn delete_keeping(
        &self,
        primary: QuoteId,
        ids: &BTreeSet<QuoteId>,
    ) -> std::result::Result<usize, crate::Error> {
        match self.delete_quotes_keeping(primary, ids) {
            Ok(Some(deleted)) => Ok(deleted),
            Ok(None) => Err(crate::Error::NotFound(primary)),
            Err(e) => Err(crate::Error::StoreTransaction(e.to_string())),
        }
    }
}
