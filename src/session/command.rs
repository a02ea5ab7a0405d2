use crate::domain::SyncKind;

/// A request line sent by an authenticated client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Refresh from GitHub, then list what is stored
    Sync(SyncKind),
    /// List what is stored without calling GitHub
    Local(SyncKind),
    Help,
    Quit,
    /// Anything else, including a blank line
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        match line {
            "/repos" => Command::Sync(SyncKind::Repos),
            "/followers" => Command::Sync(SyncKind::Followers),
            "/repos_local" => Command::Local(SyncKind::Repos),
            "/followers_local" => Command::Local(SyncKind::Followers),
            "/help" | "help" => Command::Help,
            _ if is_quit(line) => Command::Quit,
            other => Command::Unknown(other.to_string()),
        }
    }
}

/// `adios` ends the session in either phase, with or without a slash
pub fn is_quit(line: &str) -> bool {
    let line = line.trim();
    let word = line.strip_prefix('/').unwrap_or(line);
    word.eq_ignore_ascii_case("adios")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_commands() {
        assert_eq!(Command::parse("/repos"), Command::Sync(SyncKind::Repos));
        assert_eq!(Command::parse("  /followers  "), Command::Sync(SyncKind::Followers));
        assert_eq!(Command::parse("/repos_local"), Command::Local(SyncKind::Repos));
        assert_eq!(Command::parse("/followers_local"), Command::Local(SyncKind::Followers));
        assert_eq!(Command::parse("help"), Command::Help);
        assert_eq!(Command::parse("/help"), Command::Help);
    }

    #[test]
    fn quit_accepts_both_spellings() {
        assert_eq!(Command::parse("adios"), Command::Quit);
        assert_eq!(Command::parse("/adios"), Command::Quit);
        assert_eq!(Command::parse("ADIOS"), Command::Quit);
        assert!(!is_quit("adios!"));
    }

    #[test]
    fn blank_lines_are_unknown() {
        assert_eq!(Command::parse(""), Command::Unknown(String::new()));
        assert_eq!(Command::parse("  \t "), Command::Unknown(String::new()));
    }

    #[test]
    fn commands_are_case_sensitive() {
        assert_eq!(Command::parse("/REPOS"), Command::Unknown("/REPOS".into()));
    }
}
