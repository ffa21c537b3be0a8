use anyhow::{bail, Context, Result};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use piclib::config::Config;
use piclib::ingest::discover_files;
use piclib::integrity::{FailureKind, IntegrityChecker, IntegrityProgress};
use piclib::{logging, Library, Picture};

const NAME_WIDTH: usize = 22;

#[derive(Parser)]
#[command(name = "piclib")]
#[command(about = "Content-addressed photo library")]
#[command(version)]
struct Cli {
    /// Library root (overrides config, $PICLIB and ~/.piclib)
    #[arg(long, global = true)]
    lib: Option<PathBuf>,

    /// Config file (default: $PICLIB_CONFIG or the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Copy files into the library. Reads a list of paths from stdin when
    /// none are given.
    Put {
        /// Walk directories for files with configured extensions
        #[arg(short, long)]
        recursive: bool,
        files: Vec<PathBuf>,
    },
    /// List pictures, newest taken first
    List {
        /// Maximum number of pictures (0 = all)
        #[arg(long, default_value_t = 0)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
        /// Only pictures taken on or after this date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        from: Option<NaiveDate>,
        /// Only pictures taken on or before this date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        to: Option<NaiveDate>,
        /// Print JSON instead of tab-separated lines
        #[arg(long)]
        json: bool,
    },
    /// Check stored files against their content hash. Reads ids from stdin
    /// when none are given.
    Validate {
        /// Validate every picture
        #[arg(long, conflicts_with = "ids")]
        all: bool,
        ids: Vec<i64>,
    },
    /// Move renamed originals back to their canonical names
    Repair,
    /// List files in the library root that belong to no picture
    Untracked,
    /// Show or set the notes of a picture
    Notes { id: i64, text: Option<String> },
    /// Show or set a metadata field of a picture
    Meta {
        id: i64,
        field: String,
        value: Option<String>,
        /// Show every recorded value, newest first
        #[arg(long, conflicts_with = "value")]
        history: bool,
    },
    /// Write a picture's thumbnail to a file or stdout
    Thumb {
        id: i64,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Rebuild thumbnails from the stored originals
    Rethumb {
        #[arg(long, conflicts_with = "ids")]
        all: bool,
        ids: Vec<i64>,
    },
    /// Print the on-disk path of a picture
    Path { id: i64 },
    /// Remove a picture and its stored file
    Rm { id: i64 },
    /// Print the effective configuration
    Config,
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::load().context("loading config")?,
    };
    if let Some(lib) = &cli.lib {
        config.library = lib.clone();
    }

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let _ = logging::init(config.log.target, &config.log_dir(), level);

    if let Command::Config = cli.command {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let lib = Library::open_with_config(&config.library, &config.thumbnails)
        .with_context(|| format!("opening library at {}", config.library.display()))?;

    match cli.command {
        Command::Put { recursive, files } => put(&lib, &config, recursive, files),
        Command::List {
            limit,
            offset,
            from,
            to,
            json,
        } => list(&lib, limit, offset, from, to, json),
        Command::Validate { all, ids } => validate(&lib, all, ids),
        Command::Repair => repair(&lib),
        Command::Untracked => {
            for path in lib.untracked()? {
                println!("{}", path.display());
            }
            Ok(())
        }
        Command::Notes { id, text } => {
            let pic = lib.picture(id)?;
            match text {
                Some(text) => pic.set_notes(&text)?,
                None => println!("{}", pic.notes()?),
            }
            Ok(())
        }
        Command::Meta {
            id,
            field,
            value,
            history,
        } => {
            let pic = lib.picture(id)?;
            if history {
                for record in pic.meta_history(&field)? {
                    println!("{}\t{}", record.time, record.value);
                }
            } else if let Some(value) = value {
                pic.set_meta(&field, &value)?;
            } else if let Some(value) = pic.meta(&field)? {
                println!("{}", value);
            }
            Ok(())
        }
        Command::Thumb { id, output } => {
            let thumb = lib.picture(id)?.thumb()?;
            if thumb.is_empty() {
                bail!("picture {} has no thumbnail", id);
            }
            match output {
                Some(path) => std::fs::write(&path, &thumb)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => io::stdout().write_all(&thumb)?,
            }
            Ok(())
        }
        Command::Rethumb { all, ids } => rethumb(&lib, all, ids),
        Command::Path { id } => {
            println!("{}", lib.picture(id)?.filepath().display());
            Ok(())
        }
        Command::Rm { id } => {
            lib.delete(id)?;
            Ok(())
        }
        Command::Config => Ok(()),
    }
}

fn read_stdin_words() -> Result<Vec<String>> {
    let mut data = String::new();
    io::stdin().read_to_string(&mut data)?;
    Ok(data.split_whitespace().map(str::to_string).collect())
}

fn ids_or_stdin(ids: Vec<i64>) -> Result<Vec<i64>> {
    if !ids.is_empty() {
        return Ok(ids);
    }
    read_stdin_words()?
        .iter()
        .map(|w| w.parse::<i64>().with_context(|| format!("invalid id '{w}'")))
        .collect()
}

fn put(lib: &Library, config: &Config, recursive: bool, files: Vec<PathBuf>) -> Result<()> {
    let files = if files.is_empty() {
        read_stdin_words()?.into_iter().map(PathBuf::from).collect()
    } else {
        files
    };

    let mut failed = 0usize;
    for path in files {
        let sources = if path.is_dir() {
            if !recursive {
                eprintln!("[ERR] {} is a directory (use -r)", path.display());
                failed += 1;
                continue;
            }
            let found = discover_files(&path, &config.import.extensions);
            for e in &found.errors {
                eprintln!("[ERR] {}", e);
                failed += 1;
            }
            found.files
        } else {
            vec![path]
        };

        for source in sources {
            if !add_one(lib, &source) {
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{} file(s) could not be added", failed);
    }
    Ok(())
}

fn add_one(lib: &Library, source: &Path) -> bool {
    match lib.ingest(source) {
        Ok(ingested) => {
            for warning in &ingested.warnings {
                tracing::info!(path = %source.display(), %warning, "ingested without full metadata");
            }
            println!("[ADD] {} (id {})", ingested.picture.name, ingested.picture.id);
            true
        }
        Err(e) if e.is_duplicate() => {
            println!("[SKIP] {}", e);
            true
        }
        Err(e) => {
            eprintln!("[ERR] {}: {}", source.display(), e);
            false
        }
    }
}

#[derive(Serialize)]
struct ListEntry {
    id: i64,
    sum: String,
    name: String,
    added: i64,
    taken: i64,
    orient: u8,
    notes: String,
}

fn list(
    lib: &Library,
    limit: u32,
    offset: u32,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    json: bool,
) -> Result<()> {
    let pictures = if from.is_none() && to.is_none() {
        lib.list(limit, offset)?
    } else {
        // Undated pictures have no place in a date range.
        let start = from
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|t| t.and_utc())
            .unwrap_or_else(|| DateTime::UNIX_EPOCH + chrono::Duration::seconds(1));
        let end = to
            .and_then(|d| d.and_hms_opt(23, 59, 59))
            .map(|t| t.and_utc())
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let take = if limit == 0 { usize::MAX } else { limit as usize };
        lib.list_time(start, end)?
            .into_iter()
            .skip(offset as usize)
            .take(take)
            .collect()
    };

    if json {
        let entries = pictures
            .iter()
            .map(|p| -> Result<ListEntry> {
                Ok(ListEntry {
                    id: p.id,
                    sum: p.sum.to_hex(),
                    name: p.name.clone(),
                    added: p.added.timestamp(),
                    taken: p.taken_timestamp(),
                    orient: p.orient,
                    notes: p.notes()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for pic in &pictures {
        println!("{}", list_line(pic, &pic.notes()?));
    }
    Ok(())
}

fn list_line(pic: &Picture<'_>, notes: &str) -> String {
    let date = match pic.taken {
        Some(t) => format!("{}/{}/{}", t.year(), t.month(), t.day()),
        None => "-".to_string(),
    };
    format!(
        "{}\t{}\t{}\t\"{}\"\t{}",
        pic.id,
        pic.taken_timestamp(),
        date,
        short_name(&pic.name),
        notes
    )
}

/// Names longer than the column keep their tail, which usually carries the
/// distinguishing counter and extension.
fn short_name(name: &str) -> String {
    let count = name.chars().count();
    if count <= NAME_WIDTH {
        return name.to_string();
    }
    let tail: String = name.chars().skip(count - NAME_WIDTH).collect();
    format!("...{}", tail)
}

fn validate(lib: &Library, all: bool, ids: Vec<i64>) -> Result<()> {
    let checker = IntegrityChecker::new(lib);
    let report = if all {
        checker.validate_all(None)?
    } else {
        let mut pictures = Vec::new();
        for id in ids_or_stdin(ids)? {
            match lib.picture(id) {
                Ok(pic) => pictures.push(pic),
                Err(e) => eprintln!("[ERR] {}", e),
            }
        }
        checker.validate(&pictures, None)
    };

    for failure in &report.failures {
        let reason = match &failure.kind {
            FailureKind::BadSum => "checksum mismatch".to_string(),
            FailureKind::Missing => "file missing".to_string(),
            FailureKind::Io(msg) => msg.clone(),
        };
        println!(
            "[BAD] {} \"{}\" {}: {}",
            failure.id,
            failure.name,
            failure.path.display(),
            reason
        );
    }
    println!("{} checked, {} failed", report.checked, report.failures.len());

    if !report.is_clean() {
        bail!("validation failed");
    }
    Ok(())
}

fn repair(lib: &Library) -> Result<()> {
    let (tx, rx) = mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            match event {
                IntegrityProgress::Restored(restored) => println!(
                    "[FIX] {} -> {} (id {})",
                    restored.from.display(),
                    restored.to.display(),
                    restored.id
                ),
                IntegrityProgress::RepairFailed(failure) => eprintln!(
                    "[ERR] {} (id {}): {}",
                    failure.path.display(),
                    failure.id,
                    failure.error
                ),
                _ => {}
            }
        }
    });

    let result = IntegrityChecker::new(lib).repair_renames(Some(tx));
    let _ = printer.join();
    let report = result?;
    println!(
        "{} untracked file(s) examined, {} restored, {} failed",
        report.examined,
        report.restored.len(),
        report.failures.len()
    );

    if !report.failures.is_empty() {
        bail!("some renamed originals could not be restored");
    }
    Ok(())
}

fn rethumb(lib: &Library, all: bool, ids: Vec<i64>) -> Result<()> {
    let ids = if all {
        lib.list(0, 0)?.into_iter().map(|p| p.id).collect()
    } else {
        ids_or_stdin(ids)?
    };

    let mut failed = 0usize;
    for id in ids {
        match lib.refresh_thumbnail(id) {
            Ok(warnings) if warnings.is_empty() => println!("[THUMB] {}", id),
            Ok(warnings) => {
                for warning in warnings {
                    println!("[THUMB] {}: {}", id, warning);
                }
            }
            Err(e) => {
                eprintln!("[ERR] {}: {}", id, e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{} thumbnail(s) could not be rebuilt", failed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_name() {
        assert_eq!(short_name("IMG_0001.jpg"), "IMG_0001.jpg");
        let long = "a_really_long_holiday_file_name_0042.jpg";
        let short = short_name(long);
        assert_eq!(short, "...day_file_name_0042.jpg");
        assert_eq!(short.chars().count(), NAME_WIDTH + 3);
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2021-06-15").unwrap(), NaiveDate::from_ymd_opt(2021, 6, 15).unwrap());
        assert!(parse_date("15/06/2021").is_err());
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from(["piclib", "--lib", "/tmp/lib", "list", "--limit", "5"]).unwrap();
        assert_eq!(cli.lib, Some(PathBuf::from("/tmp/lib")));
        assert!(matches!(cli.command, Command::List { limit: 5, .. }));

        assert!(Cli::try_parse_from(["piclib", "validate", "--all", "3"]).is_err());
    }
}
