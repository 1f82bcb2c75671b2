use std::fmt;

use chrono::{DateTime, Utc};
use skill_core::TopicIndex;
use skill_core::model::{Curriculum, TopicId, UserId, UserProgress};
use storage::repository::Storage;
use storage::sample::{apply_completions, parse_curriculum, sample_curriculum};

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    file: Option<String>,
    user_id: UserId,
    complete: Vec<TopicId>,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidUserId { raw: String },
    InvalidTopicId { raw: String },
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidUserId { raw } => write!(f, "invalid --user value: {raw}"),
            ArgsError::InvalidTopicId { raw } => write!(f, "invalid --complete value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("SKILL_DB_URL").unwrap_or_else(|_| "sqlite:dev.sqlite3?mode=rwc".into());
        let mut file = std::env::var("SKILL_CURRICULUM_FILE").ok();
        let mut user_id = std::env::var("SKILL_USER_ID")
            .ok()
            .and_then(|value| value.parse::<UserId>().ok())
            .unwrap_or_else(|| UserId::new(1));
        let mut complete = Vec::new();
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--file" => {
                    file = Some(require_value(&mut args, "--file")?);
                }
                "--user" => {
                    let value = require_value(&mut args, "--user")?;
                    user_id = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidUserId { raw: value.clone() })?;
                }
                "--complete" => {
                    let value = require_value(&mut args, "--complete")?;
                    let id = TopicId::new(value.clone())
                        .map_err(|_| ArgsError::InvalidTopicId { raw: value })?;
                    complete.push(id);
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            file,
            user_id,
            complete,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:dev.sqlite3?mode=rwc)");
    eprintln!("  --file <path>             Curriculum JSON (default: bundled sample)");
    eprintln!("  --user <id>               Learner to pre-complete topics for (default: 1)");
    eprintln!("  --complete <topic-id>     Complete an available topic; repeatable, applied in order");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  SKILL_DB_URL, SKILL_CURRICULUM_FILE, SKILL_USER_ID");
}

fn load_curriculum(file: Option<&str>) -> Result<Curriculum, Box<dyn std::error::Error>> {
    match file {
        Some(path) => {
            let json = std::fs::read_to_string(path)?;
            Ok(parse_curriculum(&json)?)
        }
        None => Ok(sample_curriculum()?),
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let curriculum = load_curriculum(args.file.as_deref())?;
    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    let revision = storage.curricula.save_curriculum(&curriculum, now).await?;

    let stored = storage
        .progress
        .load_progress(args.user_id)
        .await?
        .unwrap_or_else(|| UserProgress::new(args.user_id));
    let progress = apply_completions(&curriculum, stored, &args.complete, now.date_naive())?;
    let index = TopicIndex::from_nodes(&curriculum.nodes);
    if !args.complete.is_empty() {
        storage.progress.save_progress(&progress, now).await?;
    }

    println!(
        "Seeded \"{}\" ({} topics, revision {}) into {}; user {} has {} completed",
        curriculum.title,
        index.len(),
        revision,
        args.db_url,
        args.user_id,
        progress.completed().len()
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
