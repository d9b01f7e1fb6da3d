mod commands;
mod logging;
mod progress;

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use progress::CliReporter;
use quote_dedup_core::analysis::duplicates::describe_pairs;
use quote_dedup_core::config::{clamp_threshold, load_configuration};
use quote_dedup_core::{
    AppConfig, Database, DedupEngine, JobRegistry, Language, NewQuote, QuoteFilter, QuoteId,
    Sentiment,
};
use serde_json::json;
use tracing::{error, info};

fn main() {
    dotenv().ok();

    let _guard = logging::init_logger();

    let mut config = match load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();
    if let Some(db) = args.db {
        config.db_path = db;
    }

    let Some(command) = args.command else {
        let _ = Cli::command().print_long_help();
        return;
    };

    if let Err(err) = run(command, &config) {
        error!("Error: {:#}", err);
        process::exit(1);
    }
}

fn run(command: Commands, config: &AppConfig) -> Result<()> {
    match command {
        Commands::Add {
            text,
            author,
            language,
            category,
        } => {
            let db = open_database(config)?;
            let mut quote = NewQuote::new(&text, &author, language.parse::<Language>()?);
            quote.category = category;
            let stored = db.insert_quote(&quote)?;
            println!("Added quote {}", stored.id.to_string().green());
        }
        Commands::Import { file, language } => {
            let db = open_database(config)?;
            run_import(&db, &file, language.parse::<Language>()?)?;
        }
        Commands::List {
            language,
            sentiment,
            author,
            verified,
            search,
            offset,
            limit,
        } => {
            let filter = QuoteFilter {
                language: language.map(|code| code.parse::<Language>()).transpose()?,
                sentiment: sentiment.map(|s| s.parse::<Sentiment>()).transpose()?,
                author,
                verified,
                search,
                offset,
                limit,
            };
            let db = open_database(config)?;
            let quotes = db.list_quotes_filtered(&filter)?;
            for quote in &quotes {
                println!(
                    "{:>6} [{}] \"{}\" - {}",
                    quote.id.to_string().cyan(),
                    quote.language,
                    quote.text,
                    quote.author
                );
            }
            info!("{} quotes", quotes.len());
        }
        Commands::Stats { json } => {
            let db = open_database(config)?;
            let stats = db.statistics()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Total quotes: {}", stats.total_quotes.to_string().green());
                for (code, count) in &stats.by_language {
                    println!("  {}: {}", code, count);
                }
                let sentiment = &stats.by_sentiment;
                println!(
                    "Sentiment: {} positive, {} negative, {} neutral, {} unscored",
                    sentiment.positive.to_string().green(),
                    sentiment.negative.to_string().red(),
                    sentiment.neutral,
                    sentiment.unknown.to_string().yellow()
                );
                println!("Verified: {}", stats.verified_count.to_string().cyan());
            }
        }
        Commands::FindDuplicates { threshold, json } => {
            let threshold = clamp_threshold(threshold, config.default_threshold);
            run_find_duplicates(config, threshold, json)?;
        }
        Commands::Merge {
            primary,
            duplicates,
            json,
        } => {
            let engine = build_engine(config)?;
            let duplicates: BTreeSet<QuoteId> = duplicates.into_iter().map(QuoteId).collect();
            let outcome = engine.merge(QuoteId(primary), &duplicates)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!(
                    "Merged into quote {}: {} duplicates deleted",
                    primary.to_string().green(),
                    outcome.deleted.to_string().red()
                );
            }
        }
        Commands::AutoMerge { threshold, yes } => {
            let threshold = clamp_threshold(threshold, config.default_threshold);
            let prompt = format!(
                "Delete every quote scoring >= {:.2} against an older quote?",
                threshold
            );
            if !yes && !prompt_confirm(&prompt, Some(false))? {
                return Ok(());
            }
            let engine = build_engine(config)?;
            let report = engine.auto_merge(threshold, &CliReporter::new())?;
            for (plan, outcome) in &report.plans {
                let ids: Vec<String> = plan.duplicates.iter().map(|id| id.to_string()).collect();
                println!(
                    "kept {} <- deleted {} ({})",
                    plan.primary.to_string().green(),
                    outcome.deleted,
                    ids.join(", ")
                );
            }
            info!(
                "{} clusters merged, {} quotes deleted",
                format!("{}", report.plans.len()).cyan(),
                format!("{}", report.deleted).red(),
            );
        }
        Commands::PrintConfig => {
            println!("Configuration: {:?}", config);
        }
        Commands::TruncateDb => {
            if prompt_confirm(
                "Are you SURE you want to delete EVERY quote in the database?",
                Some(false),
            )? {
                let db = open_database(config)?;
                db.truncate_all()?;
                println!("All quotes deleted");
            }
        }
    }

    Ok(())
}

fn open_database(config: &AppConfig) -> Result<Database> {
    Database::open(&config.db_path)
        .with_context(|| format!("opening database '{}'", config.db_path))
}

fn build_engine(config: &AppConfig) -> Result<DedupEngine<Database>> {
    let db = open_database(config)?;
    Ok(DedupEngine::new(db, Arc::new(JobRegistry::new())).with_config(config))
}

fn run_import(db: &Database, file: &Path, language: Language) -> Result<()> {
    let content = fs::read_to_string(file)
        .with_context(|| format!("reading '{}'", file.display()))?;
    let source = file.file_name().map(|name| name.to_string_lossy().into_owned());
    let summary =
        quote_dedup_core::import::import_quotes(db, &content, language, source.as_deref())?;
    info!(
        "{} imported, {} skipped, {} errors",
        format!("{}", summary.imported).green(),
        format!("{}", summary.skipped).yellow(),
        format!("{}", summary.errors).red(),
    );
    Ok(())
}

fn run_find_duplicates(config: &AppConfig, threshold: f64, as_json: bool) -> Result<()> {
    let engine = build_engine(config)?;
    let reporter = CliReporter::new();
    let report = engine.find_duplicates(threshold, &reporter)?;

    let quotes = engine.store().list_quotes()?;
    let entries = describe_pairs(&quotes, &report.pairs);

    if as_json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "duplicates": entries }))?
        );
        return Ok(());
    }

    for entry in &entries {
        println!(
            "{} {} ~ {}",
            format!("{:.3}", entry.similarity).yellow(),
            entry.quote1.id.to_string().cyan(),
            entry.quote2.id.to_string().cyan(),
        );
        println!("    {}: {}", entry.quote1.author, entry.quote1.text);
        println!("    {}: {}", entry.quote2.author, entry.quote2.text);
    }
    info!(
        "{} quotes scanned, {} candidate pairs in {:.2}s",
        report.quotes_scanned,
        format!("{}", entries.len()).red(),
        report.duration.as_secs_f64(),
    );
    Ok(())
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        if io::stdin().read_line(&mut input)? == 0 {
            return Ok(default.unwrap_or(false));
        }

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}
