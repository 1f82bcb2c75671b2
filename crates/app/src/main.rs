use std::collections::HashSet;
use std::fmt;

use services::{AppServices, Clock};
use skill_core::VisibleKind;
use skill_core::model::UserId;
use tracing_subscriber::EnvFilter;

mod render;

#[derive(Debug, PartialEq, Eq)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingTopic,
    UnknownArg(String),
    InvalidUserId { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingTopic => write!(f, "complete requires a topic id"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidUserId { raw } => write!(f, "invalid --user value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
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

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  skilltree [show]          [--db <sqlite_url>] [--user <id>] [--expand <id>]... [--expand-all] [--json]");
    eprintln!("  skilltree complete <topic> [--db <sqlite_url>] [--user <id>] [--json]");
    eprintln!("  skilltree next            [--db <sqlite_url>] [--user <id>] [--json]");
    eprintln!("  skilltree stats           [--db <sqlite_url>] [--user <id>] [--json]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:skilltree.sqlite3");
    eprintln!("  --user 1");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  SKILL_DB_URL, SKILL_USER_ID, RUST_LOG");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Show,
    Complete(String),
    Next,
    Stats,
}

#[derive(Debug)]
struct Args {
    command: Command,
    db_url: String,
    user_id: UserId,
    expanded: HashSet<String>,
    expand_all: bool,
    json: bool,
}

impl Args {
    fn parse(
        argv: impl IntoIterator<Item = String>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ArgsError> {
        let mut args = argv.into_iter().peekable();

        let command = match args.peek().map(String::as_str) {
            Some("show") => {
                args.next();
                Command::Show
            }
            Some("complete") => {
                args.next();
                match args.next() {
                    Some(topic) if !topic.starts_with("--") => Command::Complete(topic),
                    _ => return Err(ArgsError::MissingTopic),
                }
            }
            Some("next") => {
                args.next();
                Command::Next
            }
            Some("stats") => {
                args.next();
                Command::Stats
            }
            Some(first) if !first.starts_with('-') => {
                return Err(ArgsError::UnknownArg(first.to_owned()));
            }
            _ => Command::Show,
        };

        let mut db_url = env("SKILL_DB_URL")
            .map_or_else(|| "sqlite://skilltree.sqlite3".into(), normalize_sqlite_url);
        let mut user_id = env("SKILL_USER_ID")
            .and_then(|value| value.parse::<UserId>().ok())
            .unwrap_or_else(|| UserId::new(1));
        let mut expanded = HashSet::new();
        let mut expand_all = false;
        let mut json = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--user" => {
                    let value = require_value(&mut args, "--user")?;
                    user_id = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidUserId { raw: value.clone() })?;
                }
                "--expand" => {
                    expanded.insert(require_value(&mut args, "--expand")?);
                }
                "--expand-all" => expand_all = true,
                "--json" => json = true,
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            command,
            db_url,
            user_id,
            expanded,
            expand_all,
            json,
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    if argv.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let parsed = Args::parse(argv, |key| std::env::var(key).ok()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&parsed.db_url)?;
    let services = AppServices::new_sqlite(&parsed.db_url, Clock::system()).await?;
    if services.seeded_on_launch() {
        eprintln!("installed the bundled curriculum into {}", parsed.db_url);
    }
    let tree = services.skill_tree();
    tracing::debug!(db = %parsed.db_url, user = %parsed.user_id, command = ?parsed.command, "running");

    match &parsed.command {
        Command::Show => {
            let mut expanded = parsed.expanded.clone();
            if parsed.expand_all {
                // each pass reveals one more level of the tree
                loop {
                    let view = tree.graph_view(parsed.user_id, &expanded).await?;
                    let before = expanded.len();
                    expanded.extend(
                        view.rows
                            .iter()
                            .filter(|row| row.kind != VisibleKind::Topic)
                            .map(|row| row.id.clone()),
                    );
                    if expanded.len() == before {
                        break;
                    }
                }
            }
            let view = tree.graph_view(parsed.user_id, &expanded).await?;
            if parsed.json {
                print_json(&view)?;
            } else {
                print!("{}", render::graph(&view));
            }
        }
        Command::Complete(topic) => {
            let report = tree.complete_topic(parsed.user_id, topic).await?;
            if parsed.json {
                print_json(&report)?;
            } else {
                print!("{}", render::completion(&report));
            }
        }
        Command::Next => {
            let next = tree.next_topics(parsed.user_id).await?;
            if parsed.json {
                print_json(&next)?;
            } else {
                print!("{}", render::next_topics(&next));
            }
        }
        Command::Stats => {
            let view = tree.graph_view(parsed.user_id, &HashSet::new()).await?;
            if parsed.json {
                print_json(&serde_json::json!({
                    "learner": view.learner,
                    "overall": view.overall,
                    "categories": view.categories,
                }))?;
            } else {
                print!("{}", render::stats(&view));
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, ArgsError> {
        Args::parse(args.iter().map(|a| (*a).to_string()), |_| None)
    }

    #[test]
    fn no_arguments_shows_the_graph() {
        let args = parse(&[]).unwrap();
        assert_eq!(args.command, Command::Show);
        assert_eq!(args.user_id, UserId::new(1));
        assert!(args.db_url.starts_with("sqlite://"));
        assert!(args.db_url.ends_with("skilltree.sqlite3"));
    }

    #[test]
    fn complete_takes_a_topic_and_flags() {
        let args = parse(&["complete", "html", "--user", "7", "--json"]).unwrap();
        assert_eq!(args.command, Command::Complete("html".into()));
        assert_eq!(args.user_id, UserId::new(7));
        assert!(args.json);
    }

    #[test]
    fn complete_without_topic_is_an_error() {
        assert_eq!(parse(&["complete"]).unwrap_err(), ArgsError::MissingTopic);
        assert_eq!(
            parse(&["complete", "--json"]).unwrap_err(),
            ArgsError::MissingTopic
        );
    }

    #[test]
    fn expand_is_repeatable() {
        let args = parse(&["--expand", "frontend", "--expand", "javascript"]).unwrap();
        assert_eq!(args.command, Command::Show);
        assert!(args.expanded.contains("frontend"));
        assert!(args.expanded.contains("javascript"));
    }

    #[test]
    fn environment_supplies_defaults() {
        let args = Args::parse(Vec::<String>::new(), |key| match key {
            "SKILL_DB_URL" => Some("sqlite::memory:".into()),
            "SKILL_USER_ID" => Some("42".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(args.db_url, "sqlite::memory:");
        assert_eq!(args.user_id, UserId::new(42));
    }

    #[test]
    fn bad_values_are_rejected() {
        assert_eq!(
            parse(&["stats", "--user", "abc"]).unwrap_err(),
            ArgsError::InvalidUserId { raw: "abc".into() }
        );
        assert_eq!(
            parse(&["--db"]).unwrap_err(),
            ArgsError::MissingValue { flag: "--db" }
        );
        assert_eq!(
            parse(&["launch"]).unwrap_err(),
            ArgsError::UnknownArg("launch".into())
        );
    }

    #[test]
    fn relative_sqlite_paths_become_absolute() {
        let url = normalize_sqlite_url("sqlite:data/skills.db".into());
        assert!(url.starts_with("sqlite:///") || url.starts_with("sqlite://"));
        assert!(url.ends_with("data/skills.db"));
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
    }
}
