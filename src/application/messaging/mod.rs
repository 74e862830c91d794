//! Message handling - text command argument parsing

pub mod parser;

pub use parser::{double_quoted_text, int_arg, QuotedText};
