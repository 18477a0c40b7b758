//! Parsing of `!command` tokens in mention messages.

use std::sync::LazyLock;

use regex::Regex;

/// A `!word` at the start of the text or after whitespace.
static COMMAND_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?:^|\s)!(\w+)").unwrap());

/// Commands the bot understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Join,
    Kick,
    Listen,
    Unlisten,
    List,
    Speed,
}

impl Command {
    pub const ALL: [Command; 6] = [
        Command::Join,
        Command::Kick,
        Command::Listen,
        Command::Unlisten,
        Command::List,
        Command::Speed,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Command::Join => "join",
            Command::Kick => "kick",
            Command::Listen => "listen",
            Command::Unlisten => "unlisten",
            Command::List => "list",
            Command::Speed => "speed",
        }
    }

    /// Case-insensitive lookup by name.
    pub fn from_name(name: &str) -> Option<Command> {
        Command::ALL.into_iter().find(|c| c.name().eq_ignore_ascii_case(name))
    }
}

/// Outcome of looking for a command in a mention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed {
    Command(Command),
    /// No `!token` in the text.
    Missing,
    /// A `!token` that names no command.
    Unknown(String),
}

pub fn parse(text: &str) -> Parsed {
    match COMMAND_TOKEN.captures(text).and_then(|c| c.get(1)) {
        None => Parsed::Missing,
        Some(token) => match Command::from_name(token.as_str()) {
            Some(command) => Parsed::Command(command),
            None => Parsed::Unknown(token.as_str().to_string()),
        },
    }
}

/// `!join, !kick, ...` for help replies.
pub fn available_commands() -> String {
    Command::ALL
        .iter()
        .map(|c| format!("!{}", c.name()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// The speech rate given as the last whitespace-separated token.
///
/// Only finite, positive numbers are accepted.
pub fn parse_speed(text: &str) -> Option<f32> {
    let rate: f32 = text.split_whitespace().last()?.parse().ok()?;
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(parse("@bot !LISTEN"), Parsed::Command(Command::Listen));
        assert_eq!(parse("@bot !Listen"), Parsed::Command(Command::Listen));
        assert_eq!(parse("!unlisten @bot"), Parsed::Command(Command::Unlisten));
    }

    #[test]
    fn test_parse_missing() {
        assert_eq!(parse("@bot hello there"), Parsed::Missing);
        assert_eq!(parse(""), Parsed::Missing);
    }

    #[test]
    fn test_bang_inside_word_is_not_a_command() {
        assert_eq!(parse("@bot wow!listen"), Parsed::Missing);
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(parse("@bot !bogus"), Parsed::Unknown("bogus".to_string()));
    }

    #[test]
    fn test_first_token_wins() {
        assert_eq!(parse("@bot !join !kick"), Parsed::Command(Command::Join));
    }

    #[test]
    fn test_prefix_is_not_a_match() {
        // "!listener" is its own token, not "!listen"
        assert_eq!(parse("@bot !listener"), Parsed::Unknown("listener".to_string()));
    }

    #[test]
    fn test_available_commands() {
        assert_eq!(available_commands(), "!join, !kick, !listen, !unlisten, !list, !speed");
    }

    #[test]
    fn test_parse_speed() {
        assert_eq!(parse_speed("@bot !speed 1.5"), Some(1.5));
        assert_eq!(parse_speed("@bot !speed 2"), Some(2.0));
        assert_eq!(parse_speed("@bot !speed fast"), None);
        assert_eq!(parse_speed("@bot !speed"), None);
        assert_eq!(parse_speed("@bot !speed -1"), None);
        assert_eq!(parse_speed("@bot !speed 0"), None);
        assert_eq!(parse_speed("@bot !speed NaN"), None);
        assert_eq!(parse_speed("@bot !speed inf"), None);
    }
}
