use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::application::errors::CommandError;

/// How a command name is matched against message text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStrategy {
    /// Name at the start of the message, followed by whitespace or the end
    #[default]
    Start,
    /// The message is exactly the name
    StartOnly,
    /// Name anywhere in the message as a whole token
    Match,
}

impl MatchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStrategy::Start => "start",
            MatchStrategy::StartOnly => "startonly",
            MatchStrategy::Match => "match",
        }
    }
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchStrategy {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(MatchStrategy::Start),
            "startonly" => Ok(MatchStrategy::StartOnly),
            "match" => Ok(MatchStrategy::Match),
            other => Err(CommandError::InvalidStrategy(other.to_string())),
        }
    }
}

/// A custom text command owned by a guild
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub name: String,
    #[serde(rename = "guild")]
    pub scope: String,
    pub content: String,
    pub matching: MatchStrategy,
}

impl Command {
    pub fn new(
        scope: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
        matching: MatchStrategy,
    ) -> Self {
        Self {
            name: name.into(),
            scope: scope.into(),
            content: content.into(),
            matching,
        }
    }

    /// Store key of the command. Length-prefixed so that no two
    /// (scope, name) pairs share a key.
    pub fn identity(scope: &str, name: &str) -> String {
        format!("{}:{}:{}", scope.len(), scope, name)
    }

    pub fn id(&self) -> String {
        Self::identity(&self.scope, &self.name)
    }
}

/// Every char for which `char::is_whitespace` holds, so boundaries agree
/// with `split_whitespace`. regex-lite's `\s` is ASCII only.
const WHITESPACE: &str =
    r"[\t\n\x0B\x0C\r \x{85}\x{A0}\x{1680}\x{2000}-\x{200A}\x{2028}\x{2029}\x{202F}\x{205F}\x{3000}]";

/// Compiled matcher for one command name and strategy
#[derive(Debug, Clone)]
pub struct CommandMatcher {
    regex: Regex,
}

impl CommandMatcher {
    pub fn new(name: &str, strategy: MatchStrategy) -> Result<Self, regex_lite::Error> {
        let name = regex_lite::escape(name);
        let pattern = match strategy {
            MatchStrategy::Start => format!(r"^{}({}|$)", name, WHITESPACE),
            MatchStrategy::StartOnly => format!(r"^{}$", name),
            MatchStrategy::Match => format!(r"(^|{ws}){}({ws}|$)", name, ws = WHITESPACE),
        };
        Ok(Self {
            regex: Regex::new(&pattern)?,
        })
    }

    pub fn for_command(command: &Command) -> Result<Self, regex_lite::Error> {
        Self::new(&command.name, command.matching)
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(name: &str, strategy: MatchStrategy, text: &str) -> bool {
        CommandMatcher::new(name, strategy).unwrap().is_match(text)
    }

    #[test]
    fn test_start_requires_boundary_after_name() {
        assert!(matches("ping", MatchStrategy::Start, "ping"));
        assert!(matches("ping", MatchStrategy::Start, "ping me now"));
        assert!(!matches("ping", MatchStrategy::Start, "pingpong"));
        assert!(!matches("ping", MatchStrategy::Start, "say ping"));
    }

    #[test]
    fn test_startonly_requires_exact_text() {
        assert!(matches("ping", MatchStrategy::StartOnly, "ping"));
        assert!(!matches("ping", MatchStrategy::StartOnly, "ping "));
        assert!(!matches("ping", MatchStrategy::StartOnly, "ping me"));
    }

    #[test]
    fn test_match_finds_whole_token_anywhere() {
        assert!(matches("ping", MatchStrategy::Match, "ping"));
        assert!(matches("ping", MatchStrategy::Match, "well ping there"));
        assert!(matches("ping", MatchStrategy::Match, "last ping"));
        assert!(!matches("ping", MatchStrategy::Match, "stopping now"));
        assert!(!matches("ping", MatchStrategy::Match, "ping!"));
    }

    #[test]
    fn test_unicode_whitespace_is_a_boundary() {
        assert!(matches("ping", MatchStrategy::Start, "ping\u{a0}now"));
        assert!(matches("ping", MatchStrategy::Match, "say\u{a0}ping\u{3000}now"));
        assert!(matches("ping", MatchStrategy::Match, "say\u{2003}ping"));
        assert!(!matches("ping", MatchStrategy::StartOnly, "ping\u{a0}now"));
        assert!(!matches("ping", MatchStrategy::Start, "ping\u{200b}now"));

        // same split as the command tokenizer
        let tokens: Vec<_> = "ping\u{a0}now".split_whitespace().collect();
        assert_eq!(tokens, vec!["ping", "now"]);
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        assert!(!matches("ping", MatchStrategy::Start, "Ping"));
    }

    #[test]
    fn test_metacharacters_are_literal() {
        for strategy in [MatchStrategy::Start, MatchStrategy::StartOnly, MatchStrategy::Match] {
            assert!(matches("a.b*c", strategy, "a.b*c"));
            assert!(!matches("a.b*c", strategy, "axbbbc"));
            assert!(!matches("a.b*c", strategy, "ac"));
        }
        assert!(matches("(hi)", MatchStrategy::Start, "(hi) there"));
        assert!(matches("$5", MatchStrategy::Match, "costs $5 ok"));
        assert!(!matches("a|b", MatchStrategy::StartOnly, "a"));
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("startonly".parse::<MatchStrategy>().unwrap(), MatchStrategy::StartOnly);
        assert!(matches!(
            "begin".parse::<MatchStrategy>(),
            Err(CommandError::InvalidStrategy(s)) if s == "begin"
        ));
        assert_eq!(MatchStrategy::default(), MatchStrategy::Start);
    }

    #[test]
    fn test_identity_is_unambiguous() {
        assert_ne!(Command::identity("a-b", "c"), Command::identity("a", "b-c"));
        assert_ne!(Command::identity("a:1", "x"), Command::identity("a", "1:x"));
    }
}
