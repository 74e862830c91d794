//! Argument parsing helpers for text commands

use crate::application::errors::CommandError;

/// Text pulled out of a token list, and the index of the next unread token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotedText {
    pub text: String,
    pub next: usize,
}

/// Extract a single bare token or a double-quoted phrase starting at `start`.
///
/// A token starting with `"` is joined with the following tokens (single
/// spaces) up to the first one ending with `"`, and the outer quotes are
/// stripped.
pub fn double_quoted_text(tokens: &[&str], start: usize) -> Result<QuotedText, CommandError> {
    let first = match tokens.get(start) {
        Some(token) if !token.is_empty() => *token,
        _ => return Err(CommandError::MissingContent),
    };

    if !first.starts_with('"') {
        return Ok(QuotedText {
            text: first.to_string(),
            next: start + 1,
        });
    }

    let mut content = first.to_string();
    let mut index = start;
    while !closes_quote(&content) {
        index += 1;
        match tokens.get(index) {
            Some(token) => {
                content.push(' ');
                content.push_str(token);
            }
            None => return Err(CommandError::UnterminatedQuote),
        }
    }

    Ok(QuotedText {
        text: content[1..content.len() - 1].to_string(),
        next: index + 1,
    })
}

/// A lone `"` opens a phrase without closing it
fn closes_quote(content: &str) -> bool {
    content.len() >= 2 && content.ends_with('"')
}

/// Parse an integer argument, falling back to `default` when absent or invalid
pub fn int_arg(tokens: &[&str], index: usize, default: i64) -> i64 {
    tokens
        .get(index)
        .and_then(|t| t.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoted_phrase_spans_tokens() {
        let tokens = ["addcmd", "hello", "\"multi", "word\"", "start"];
        let quoted = double_quoted_text(&tokens, 2).unwrap();
        assert_eq!(quoted.text, "multi word");
        assert_eq!(quoted.next, 4);
        assert_eq!(tokens[quoted.next], "start");
    }

    #[test]
    fn test_bare_token() {
        let tokens = ["/addcmd", "ping", "pong"];
        assert_eq!(
            double_quoted_text(&tokens, 2).unwrap(),
            QuotedText { text: "pong".to_string(), next: 3 }
        );
    }

    #[test]
    fn test_single_quoted_token() {
        let tokens = ["/addcmd", "ping", "\"pong\""];
        assert_eq!(double_quoted_text(&tokens, 2).unwrap().text, "pong");
        let tokens = ["/addcmd", "ping", "\"\""];
        assert_eq!(double_quoted_text(&tokens, 2).unwrap().text, "");
    }

    #[test]
    fn test_missing_content() {
        let tokens = ["/addcmd", "ping"];
        assert!(matches!(double_quoted_text(&tokens, 2), Err(CommandError::MissingContent)));
    }

    #[test]
    fn test_unterminated_quote() {
        let tokens = ["/addcmd", "ping", "\"never", "closed"];
        assert!(matches!(double_quoted_text(&tokens, 2), Err(CommandError::UnterminatedQuote)));
        let tokens = ["/addcmd", "ping", "\""];
        assert!(matches!(double_quoted_text(&tokens, 2), Err(CommandError::UnterminatedQuote)));
    }

    #[test]
    fn test_int_arg() {
        let tokens = ["/roll", "20", "x"];
        assert_eq!(int_arg(&tokens, 1, 100), 20);
        assert_eq!(int_arg(&tokens, 2, 100), 100);
        assert_eq!(int_arg(&tokens, 5, 100), 100);
    }
}
