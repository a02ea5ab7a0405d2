//! Text responses sent to relay clients

use std::fmt::Display;

use chrono::{DateTime, Local, TimeZone, Utc};
use itertools::Itertools;
use unicode_width::UnicodeWidthStr;

use crate::domain::{FollowerRow, RepoRow, SyncKind, UserStatus};

/// Prefix the client uses to recognize a rejected username
pub const LOGIN_ERROR_PREFIX: &str = "ERROR_LOGIN";

pub const QUIT_REPLY: &str = "adios";

const NEVER: &str = "never";
const REPO_NAME_WIDTH: usize = 32;
const LANGUAGE_WIDTH: usize = 12;
const FOLLOWER_LOGIN_WIDTH: usize = 30;

pub fn commands_help() -> String {
    [
        "Available commands:",
        "  /repos           -> sync repositories from GitHub and list the stored ones",
        "  /followers       -> sync followers from GitHub and list the stored ones",
        "  /repos_local     -> list repositories stored in the database",
        "  /followers_local -> list followers stored in the database",
        "  /help            -> show this help",
        "  adios            -> close the connection",
    ]
    .iter()
    .map(|line| format!("{line}\n"))
    .collect()
}

/// Trailer appended to every reply except the farewell
pub fn prompt() -> &'static str {
    "\nEnter a new command. Type /help to see the list of commands.\n"
}

pub fn format_timestamp<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    at.format("%d/%m/%Y %H:%M").to_string()
}

/// Local-time rendering of a last-sync mark, or `never`
pub fn format_last_sync(at: Option<DateTime<Utc>>) -> String {
    match at {
        Some(at) => format_timestamp(&at.with_timezone(&Local)),
        None => NEVER.to_string(),
    }
}

pub fn initial_status(status: &UserStatus) -> String {
    let login = status.login.as_deref().unwrap_or("(unknown)");
    let name = status.name.as_deref().unwrap_or("(no name)");

    format!(
        "User: {login} – {name}\n\
         Stored repositories: {} (last sync: {})\n\
         Stored followers: {} (last sync: {})\n\
         \n{}",
        status.repos_count,
        format_last_sync(status.last_sync_repos),
        status.followers_count,
        format_last_sync(status.last_sync_followers),
        commands_help(),
    )
}

pub fn repos_report(
    login: &str,
    last_sync: Option<DateTime<Utc>>,
    rows: &[RepoRow],
    synced: Option<usize>,
) -> String {
    let mut out = report_header(SyncKind::Repos, login, last_sync, synced);

    if rows.is_empty() {
        out.push_str("No repositories stored in the database.\n");
        return out;
    }

    let header = format!(
        "{} | {} | ★ Stars",
        pad("Name", REPO_NAME_WIDTH),
        pad("Language", LANGUAGE_WIDTH)
    );
    let lines = rows.iter().map(|row| {
        format!(
            "{} | {} | {}",
            pad(&row.name, REPO_NAME_WIDTH),
            pad(row.language.as_deref().unwrap_or("-"), LANGUAGE_WIDTH),
            row.stars
        )
    });

    out.push_str(&table(header, 60, lines));
    out
}

pub fn followers_report(
    login: &str,
    last_sync: Option<DateTime<Utc>>,
    rows: &[FollowerRow],
    synced: Option<usize>,
) -> String {
    let mut out = report_header(SyncKind::Followers, login, last_sync, synced);

    if rows.is_empty() {
        out.push_str("No followers stored in the database.\n");
        return out;
    }

    let header = format!("{} | URL", pad("Login", FOLLOWER_LOGIN_WIDTH));
    let lines = rows.iter().map(|row| {
        format!(
            "{} | {}",
            pad(&row.login, FOLLOWER_LOGIN_WIDTH),
            row.html_url.as_deref().unwrap_or("-")
        )
    });

    out.push_str(&table(header, 72, lines));
    out
}

pub fn login_error(login: &str, reason: impl Display) -> String {
    format!(
        "{LOGIN_ERROR_PREFIX} Could not validate user '{login}' on GitHub: {reason}\n\
         Try a different username.\n"
    )
}

pub fn empty_login() -> String {
    format!("{LOGIN_ERROR_PREFIX} The username cannot be empty.\nTry a different username.\n")
}

pub fn sync_error(kind: SyncKind, login: &str, reason: impl Display) -> String {
    format!("Error syncing {kind} for {login}: {reason}\n")
}

pub fn read_error(kind: SyncKind, login: &str, reason: impl Display) -> String {
    format!("Error reading stored {kind} for {login}: {reason}\n")
}

pub fn unknown_command() -> String {
    "Unknown command.\nUse /help to see the list of commands.\n".to_string()
}

fn report_header(
    kind: SyncKind,
    login: &str,
    last_sync: Option<DateTime<Utc>>,
    synced: Option<usize>,
) -> String {
    let (title, noun) = match kind {
        SyncKind::Repos => ("Stored repositories", "Repositories"),
        SyncKind::Followers => ("Stored followers", "Followers"),
    };

    let mut lines = vec![
        format!("[{title} for {login}]"),
        format!("Last {kind} sync: {}", format_last_sync(last_sync)),
    ];
    if let Some(synced) = synced {
        lines.push(format!("{noun} synced from GitHub in this operation: {synced}"));
    }

    format!("{}\n\n", lines.join("\n"))
}

fn table(header: String, rule_width: usize, rows: impl Iterator<Item = String>) -> String {
    let body = std::iter::once(header)
        .chain(std::iter::once("-".repeat(rule_width)))
        .chain(rows)
        .join("\n");
    format!("{body}\n")
}

/// Left-align `text` to `width` terminal columns
fn pad(text: &str, width: usize) -> String {
    let fill = width.saturating_sub(text.width());
    format!("{text}{}", " ".repeat(fill))
}
