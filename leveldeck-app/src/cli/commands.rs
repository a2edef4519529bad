use crate::api::server as api_server;
use crate::cli::opts::*;

use anyhow::{bail, Context, Result};
use leveldeck_core::{
    html_entries, Deck, DeckConfig, DeckService, Dictionary, LevelStore, MapDictionary, Presenter,
    Weights,
};
use leveldeck_json::paths::default_sqlite_file;
use leveldeck_json::{load_dictionary, JsonStore};
use leveldeck_pg::PostgresStore;
use leveldeck_sqlite::{SqliteDictionary, SqliteStore};
use log::info;
use std::io::{stdin, stdout, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

pub async fn run_cli(args: Cli) -> Result<()> {
    let store = open_store(&args).await?;
    let weights = match &args.cmd {
        Command::Init(cmd) => Some(cmd.weights.clone()),
        _ => None,
    };
    let config = DeckConfig {
        weights,
        default_level: args.default_level,
        seed: args.seed,
        ..DeckConfig::default()
    };
    let mut deck = Deck::open(store, config).await?;

    match args.cmd {
        Command::Init(_) => {
            println!("weights {:?}", deck.weights().as_slice());
            print_progress(&deck);
        }
        Command::Weights(cmd) => {
            deck.update_weights(Weights::new(cmd.weights)?).await?;
            println!("weights {:?}", deck.weights().as_slice());
            print_progress(&deck);
        }
        Command::Add(cmd) => add_cmd(&mut deck, cmd).await?,
        Command::Import(cmd) => import_cmd(&mut deck, cmd).await?,
        Command::Review(cmd) => review_cmd(deck, cmd).await?,
        Command::Progress => print_progress(&deck),
        Command::Reset => {
            let moved = deck.reset().await?;
            println!("moved {moved} keys to level {}", deck.default_level());
        }
        Command::Api(api) => {
            let dictionary = open_dictionary(&api.dict).await?;
            let presenter = if api.html {
                Presenter::default().with_value_formatter(html_entries)
            } else {
                Presenter::default()
            };
            let service = Arc::new(DeckService::new(deck, dictionary, presenter));
            let addr: std::net::SocketAddr = api.addr.parse()?;
            api_server::run(service, addr).await?;
        }
    }
    Ok(())
}

pub async fn open_store(args: &Cli) -> Result<Arc<dyn LevelStore>> {
    match args.store {
        StoreKind::Json => {
            let s = match &args.db_path {
                Some(p) => JsonStore::open_with(p.clone(), p.with_extension("backups"), 10).await?,
                None => JsonStore::open_default().await?,
            };
            Ok(Arc::new(s))
        }
        StoreKind::Sqlite => {
            let p = args.db_path.clone().unwrap_or_else(default_sqlite_file);
            if let Some(parent) = p.parent() {
                std::fs::create_dir_all(parent).ok();
            }
            Ok(Arc::new(SqliteStore::open_file(&p).await?))
        }
        StoreKind::Postgres => {
            let Some(url) = &args.db_url else {
                bail!("--store postgres needs --db-url or LEVELDECK_DB_URL");
            };
            Ok(Arc::new(PostgresStore::connect(url).await?))
        }
    }
}

pub async fn open_dictionary(path: &Path) -> Result<Arc<dyn Dictionary>> {
    let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
    let dict: Arc<dyn Dictionary> = if is_json {
        Arc::new(load_dictionary(path).await?)
    } else {
        Arc::new(SqliteDictionary::open_file(path).await?)
    };
    info!("dictionary {}", path.display());
    Ok(dict)
}

async fn add_cmd(deck: &mut Deck, cmd: AddCmd) -> Result<()> {
    let keys = match &cmd.dict {
        Some(p) => known_keys(&*open_dictionary(p).await?, cmd.keys).await?,
        None => cmd.keys,
    };
    let added = deck.update(keys).await?;
    println!("added {added}");
    Ok(())
}

async fn known_keys(dict: &dyn Dictionary, keys: Vec<String>) -> Result<Vec<String>> {
    let mut known = Vec::with_capacity(keys.len());
    for key in keys {
        match dict.lookup(&key).await {
            Ok(_) => known.push(key),
            Err(leveldeck_core::CoreError::NotFound(_)) => println!("skipped {key}: not in dictionary"),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(known)
}

async fn import_cmd(deck: &mut Deck, cmd: ImportCmd) -> Result<()> {
    let keys = read_keys(&cmd.path)?;
    let total = keys.len();
    let added = deck.update(keys).await?;
    println!("imported {added} new of {total} keys");
    Ok(())
}

/// Keys from a CSV file (first column, header row skipped) or a plain text file
/// (one per line). Blank entries are ignored.
pub fn read_keys(path: &Path) -> Result<Vec<String>> {
    let is_csv = path.extension().and_then(|e| e.to_str()) == Some("csv");
    let keys = if is_csv {
        let mut rdr = csv::Reader::from_path(path)?;
        let mut v = Vec::new();
        for rec in rdr.records() {
            let rec = rec?;
            v.push(rec.get(0).unwrap_or("").trim().to_string());
        }
        v
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?
            .lines()
            .map(|l| l.trim().to_string())
            .collect()
    };
    Ok(keys.into_iter().filter(|k| !k.is_empty()).collect())
}

async fn review_cmd(deck: Deck, cmd: ReviewCmd) -> Result<()> {
    let dictionary: Arc<dyn Dictionary> = match &cmd.dict {
        Some(p) => open_dictionary(p).await?,
        None => Arc::new(MapDictionary::default()),
    };
    let service = DeckService::new(deck, dictionary, Presenter::default());

    let mut count = 0usize;
    while count < cmd.max {
        let reply = service.draw().await?;
        let Some(key) = reply.key else {
            println!("nothing left to draw");
            break;
        };
        count += 1;
        println!("\n[{}/{}] {}", count, cmd.max, key);
        if read_line(&mut stdin().lock(), "[enter=show]")?.is_none() {
            break;
        }
        if let Some(v) = reply.value.as_str() {
            println!("{v}");
        }
        println!("[y=correct, n=wrong, d=delete, q=quit]");
        let action = loop {
            // end of input counts as quit
            let Some(line) = read_line(&mut stdin().lock(), "answer> ")? else {
                break ReviewAction::Quit;
            };
            match parse_action(&line) {
                Some(action) => break action,
                None => println!("enter y, n, d, or q"),
            }
        };
        match action {
            ReviewAction::Answer(correct) => service.answer(correct).await?,
            ReviewAction::Delete => service.delete().await?,
            ReviewAction::Quit => break,
        };
    }

    println!("\nreviewed {}", count);
    print_counts(&service.progress().await.to_vec());
    Ok(())
}

// ===== Helpers =====
fn print_progress(deck: &Deck) {
    print_counts(&deck.progress().to_vec());
}

fn print_counts(counts: &[usize]) {
    let Some((deleted, rest)) = counts.split_first() else { return };
    let Some((completed, levels)) = rest.split_last() else { return };
    println!("deleted\t{deleted}");
    for (i, n) in levels.iter().enumerate() {
        println!("level {i}\t{n}");
    }
    println!("completed\t{completed}");
}

#[derive(Debug, PartialEq)]
enum ReviewAction {
    Answer(bool),
    Delete,
    Quit,
}

fn parse_action(line: &str) -> Option<ReviewAction> {
    match line.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(ReviewAction::Answer(true)),
        "n" | "no" => Some(ReviewAction::Answer(false)),
        "d" | "delete" => Some(ReviewAction::Delete),
        "q" | "quit" => Some(ReviewAction::Quit),
        _ => None,
    }
}

/// `None` at end of input.
fn read_line(input: &mut impl BufRead, prompt: &str) -> Result<Option<String>> {
    print!("{prompt}");
    stdout().flush().ok();
    let mut s = String::new();
    if input.read_line(&mut s)? == 0 {
        return Ok(None);
    }
    Ok(Some(s))
}
