// Purse Tracker - command line
// Maintenance commands, CSV import/export and the terminal browser

// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{Datelike, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use purse_tracker::entities::{registration, user, ExpenditureFilter, NewUser};
use purse_tracker::logging::init_logging;
use purse_tracker::{auth, import, open_database, tags, Config, Tracker, User};
use rusqlite::Connection;
use std::fs::File;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "purse", version, about = "Shared purses and expenditure tracking")]
struct Cli {
    /// Database file (overrides PURSE_DATABASE)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an active account
    Createuser {
        username: String,
        email: String,
        password: String,
        #[arg(long, default_value = "")]
        first: String,
        #[arg(long, default_value = "")]
        last: String,
    },
    /// Rebuild the tags of every purse from the expenditure descriptions
    Createtags,
    /// Delete expired registrations and sessions
    Cleanupregistrations,
    /// Delete inactive accounts without pending registration
    Cleanupusers,
    /// Import expenditures from a CSV file (date,amount,description)
    Import {
        csv: PathBuf,
        #[arg(long)]
        user: String,
        /// Purse id, defaults to the user's default purse
        #[arg(long)]
        purse: Option<i64>,
    },
    /// Export a year or a month of the default purse to CSV
    Export {
        csv: PathBuf,
        #[arg(long)]
        user: String,
        #[arg(long)]
        year: i32,
        #[arg(long)]
        month: Option<u32>,
    },
    /// Browse the default purse in the terminal
    Browse {
        #[arg(long)]
        user: String,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        month: Option<u32>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let mut config = Config::from_env().context("Invalid configuration")?;
    if let Some(path) = cli.database {
        config.database_path = path.to_string_lossy().into_owned();
    }

    let db_path = Path::new(&config.database_path);
    let conn = open_database(db_path).with_context(|| format!("Failed to open database {:?}", db_path))?;

    match cli.command {
        Command::Createuser {
            username,
            email,
            password,
            first,
            last,
        } => create_user(&conn, &config, &username, &email, &password, &first, &last),
        Command::Createtags => {
            let stats = tags::rebuild_all(&conn, config.tag_min_len)?;
            println!("Tags created: {}, updated: {}", stats.created, stats.updated);
            Ok(())
        }
        Command::Cleanupregistrations => {
            let now = Utc::now();
            let deleted = registration::delete_expired(&conn, now, config.registration_days)?;
            println!("✓ Deleted {} expired registration(s)", deleted);
            let sessions = auth::delete_expired_sessions(&conn, now)?;
            println!("✓ Deleted {} expired session(s)", sessions);
            Ok(())
        }
        Command::Cleanupusers => {
            let deleted = user::delete_inactive_without_registration(&conn)?;
            println!("✓ Deleted {} inactive user(s)", deleted);
            Ok(())
        }
        Command::Import { csv, user, purse } => run_import(&conn, &config, &csv, &user, purse),
        Command::Export {
            csv,
            user,
            year,
            month,
        } => run_export(&conn, &config, &csv, &user, year, month),
        Command::Browse { user, year, month } => run_ui_mode(&conn, &config, &user, year, month),
    }
}

fn find_user(conn: &Connection, username: &str) -> Result<User> {
    user::find_by_username(conn, username)?.ok_or_else(|| anyhow!("Unknown user {:?}", username))
}

fn create_user(
    conn: &Connection,
    config: &Config,
    username: &str,
    email: &str,
    password: &str,
    first_name: &str,
    last_name: &str,
) -> Result<()> {
    if user::username_exists(conn, username)? {
        bail!("A user with that username already exists.");
    }
    let password_hash = auth::hash_password(password, config.password_iterations);
    let created = user::create(
        conn,
        &NewUser {
            username,
            email,
            first_name,
            last_name,
            password_hash: &password_hash,
            is_active: true,
        },
    )?;
    println!("✓ Created user {} (id {})", created.username, created.id);
    Ok(())
}

fn run_import(conn: &Connection, config: &Config, csv_path: &Path, username: &str, purse: Option<i64>) -> Result<()> {
    println!("📥 Expenditure import - CSV → SQLite");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let author = find_user(conn, username)?;
    let purse_id = match purse {
        Some(id) => id,
        None => Tracker::new(conn, config, &author).default_purse()?.purse.id,
    };

    println!("\n📂 Loading CSV...");
    let records = import::load_csv(csv_path).with_context(|| format!("Failed to read {:?}", csv_path))?;
    println!("✓ Loaded {} record(s)", records.len());

    println!("\n💾 Inserting expenditures...");
    let report = import::import_records(conn, &author, purse_id, &records, config.tag_min_len)?;
    println!("✓ Inserted {} expenditure(s)", report.inserted);
    println!("✓ Tags created: {}, updated: {}", report.tags.created, report.tags.updated);

    if !report.rejected.is_empty() {
        println!("\n⚠️  {} row(s) rejected:", report.rejected.len());
        for (line, reason) in &report.rejected {
            println!("   line {}: {}", line, reason);
        }
    }
    Ok(())
}

fn run_export(
    conn: &Connection,
    config: &Config,
    csv_path: &Path,
    username: &str,
    year: i32,
    month: Option<u32>,
) -> Result<()> {
    let owner = find_user(conn, username)?;
    let purse = Tracker::new(conn, config, &owner).default_purse()?;

    let (from, until) = match month {
        Some(m) => {
            let from = NaiveDate::from_ymd_opt(year, m, 1).ok_or_else(|| anyhow!("Invalid month {}", m))?;
            let until = if m == 12 {
                NaiveDate::from_ymd_opt(year + 1, 1, 1)
            } else {
                NaiveDate::from_ymd_opt(year, m + 1, 1)
            }
            .ok_or_else(|| anyhow!("Invalid month {}", m))?;
            (from, until)
        }
        None => (
            NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(|| anyhow!("Invalid year {}", year))?,
            NaiveDate::from_ymd_opt(year + 1, 1, 1).ok_or_else(|| anyhow!("Invalid year {}", year))?,
        ),
    };

    let filter = ExpenditureFilter::purse(purse.purse.id).between(from, until);
    let file = File::create(csv_path).with_context(|| format!("Failed to create {:?}", csv_path))?;
    let written = import::export_csv(conn, &filter, file)?;
    println!("✓ Exported {} expenditure(s) of {} to {:?}", written, purse.purse.name, csv_path);
    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(conn: &Connection, config: &Config, username: &str, year: Option<i32>, month: Option<u32>) -> Result<()> {
    let owner = find_user(conn, username)?;
    let today = Utc::now().date_naive();
    let year = year.unwrap_or(today.year());
    let month = month.unwrap_or(today.month());

    let tracker = Tracker::new(conn, config, &owner);
    let mut app = ui::App::new(tracker, year, month)?;
    ui::run_ui(&mut app)?;

    println!("\n👋 Goodbye!");
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_: &Connection, _: &Config, _: &str, _: Option<i32>, _: Option<u32>) -> Result<()> {
    eprintln!("❌ TUI feature not enabled!");
    eprintln!("   Rebuild with: cargo build --features tui");
    std::process::exit(1);
}
