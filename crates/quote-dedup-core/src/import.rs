use crate::error::Error;
use crate::storage::models::{normalize_text, Language, NewQuote};
use crate::storage::Database;
use ahash::AHashSet;
use serde::Serialize;
use tracing::{info, warn};

const AUTHOR_DASHES: [char; 3] = ['\u{2014}', '\u{2013}', '-'];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// Parse `"Quote text" - Author`. The dash may be an em dash, en dash or hyphen.
///
/// The closing quote mark is the last `"` that is followed by a dash and a
/// non-empty author, so quote marks inside the text are kept.
pub fn parse_quote_line(line: &str) -> Option<(String, String)> {
    let body = line.trim().strip_prefix('"')?;

    for (pos, _) in body.rmatch_indices('"') {
        let text = body[..pos].trim();
        let rest = body[pos + 1..].trim_start();
        let Some(after_dash) = rest.strip_prefix(&AUTHOR_DASHES[..]) else {
            continue;
        };
        let author = after_dash.trim();
        if !text.is_empty() && !author.is_empty() {
            return Some((text.to_string(), author.to_string()));
        }
    }
    None
}

/// Import one quote per line. Blank lines and `#` comments are ignored;
/// quotes whose exact text and author already exist are skipped.
/// All new rows are written in one transaction.
pub fn import_quotes(
    db: &Database,
    content: &str,
    language: Language,
    source: Option<&str>,
) -> Result<ImportSummary, Error> {
    let mut summary = ImportSummary::default();
    let mut seen: AHashSet<(String, String)> = AHashSet::new();
    let mut batch: Vec<NewQuote> = Vec::new();

    for (index, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((text, author)) = parse_quote_line(line) else {
            warn!("Line {}: not in \"text\" - author form, skipping", index + 1);
            summary.errors += 1;
            continue;
        };

        let key = (normalize_text(&text), author.clone());
        if seen.contains(&key) || db.find_by_text_author(&key.0, &key.1)?.is_some() {
            summary.skipped += 1;
            continue;
        }
        seen.insert(key);

        batch.push(NewQuote {
            text,
            author,
            language,
            category: None,
            source: source.map(str::to_string),
        });
    }

    summary.imported = db.insert_quotes(&batch)?.len();
    info!(
        "Imported {} quotes ({} skipped, {} errors)",
        summary.imported, summary.skipped, summary.errors
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quote_line_dash_variants() {
        for line in [
            "\"Life is short.\" \u{2014} Anon",
            "\"Life is short.\" \u{2013} Anon",
            "\"Life is short.\"-Anon",
        ] {
            assert_eq!(
                parse_quote_line(line),
                Some(("Life is short.".to_string(), "Anon".to_string()))
            );
        }
    }

    #[test]
    fn test_parse_quote_line_keeps_inner_quotes() {
        assert_eq!(
            parse_quote_line("\"He said \"no\" twice\" - Someone"),
            Some(("He said \"no\" twice".to_string(), "Someone".to_string()))
        );
    }

    #[test]
    fn test_reimport_skips_doubly_quoted_text() {
        let db = Database::open_in_memory().unwrap();
        let content = "\"\"\"Hi\"\"\" - Anon\n";

        let first = import_quotes(&db, content, Language::En, None).unwrap();
        assert_eq!(first.imported, 1);
        assert_eq!(db.list_quotes().unwrap()[0].text, "\"Hi\"");

        let second = import_quotes(&db, content, Language::En, None).unwrap();
        assert_eq!(second.imported, 0);
        assert_eq!(second.skipped, 1);
        assert_eq!(db.count_quotes().unwrap(), 1);
    }

    #[test]
    fn test_parse_quote_line_rejects_malformed() {
        assert_eq!(parse_quote_line("No quote marks - Anon"), None);
        assert_eq!(parse_quote_line("\"Missing author\" -"), None);
        assert_eq!(parse_quote_line("\"Missing dash\" Anon"), None);
    }
}
