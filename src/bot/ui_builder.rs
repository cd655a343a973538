//! UI Builder module for formatting bot replies
//!
//! Every reply is MarkdownV2. Dynamic text (record fields, user queries,
//! error details) always goes through `markdown::escape`.

use serde_json::Value;
use teloxide::utils::markdown::{bold, escape};

use crate::errors::{DocumentKind, LookupError};
use crate::shard::Record;

/// Telegram's limit on the length of one text message
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Room kept for the truncation marker
const TRUNCATION_RESERVE: usize = 32;

/// Longest part of a user query echoed back in a reply, in characters
const MAX_ECHOED_QUERY_CHARS: usize = 64;

/// Render a field value as display text
fn value_text(value: &Value) -> String {
    match value {
        Value::Null => "N/A".to_string(),
        Value::String(s) if s.trim().is_empty() => "N/A".to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => if *b { "Yes" } else { "No" }.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Format a record field by field, in the order the record stores them
pub fn format_record(record: &Record) -> String {
    let mut result = format!("🔎 {}\n", bold(&escape("Record found")));

    if record.is_empty() {
        result.push_str(&escape("(record has no fields)"));
        return result;
    }

    for (key, value) in record {
        let line = format!("\n{}: {}", bold(&escape(key)), escape(&value_text(value)));
        if result.len() + line.len() > MAX_MESSAGE_LEN - TRUNCATION_RESERVE {
            result.push_str(&format!("\n\n{}", escape("… (truncated)")));
            break;
        }
        result.push_str(&line);
    }

    result
}

/// Greeting for `/start`
pub fn welcome_message() -> String {
    format!(
        "✅ {}\n\n{}\n\n{}",
        bold(&escape("Record Lookup Bot is alive!")),
        escape("Send me a phone number or an email address and I will look up the matching record."),
        usage_message()
    )
}

/// Reply for `/help`
pub fn help_message(min_digits: usize) -> String {
    [
        format!("ℹ️ {}", bold(&escape("How to search"))),
        escape(&format!(
            "• Phone numbers: any formatting works (spaces, dashes, +, brackets); at least {} digits are required.",
            min_digits
        )),
        escape("• Email addresses: matched without regard to case."),
        format!(
            "{}\n{}\n{}\n{}",
            bold(&escape("Commands")),
            escape("/start - check that the bot is alive"),
            escape("/help - show this message"),
            escape("/search <phone or email> - look up a record"),
        ),
        escape("You can also send the phone number or email as a plain message."),
    ]
    .join("\n\n")
}

/// Short usage hint
pub fn usage_message() -> String {
    escape("Usage: /search <phone or email>, e.g. /search +91 98765 43210")
}

/// Shorten a user query for echoing
fn echoed_query(query: &str) -> String {
    let query = query.trim();
    match query.char_indices().nth(MAX_ECHOED_QUERY_CHARS) {
        Some((cut, _)) => format!("{}…", &query[..cut]),
        None => query.to_string(),
    }
}

/// Reply when nothing matches
pub fn not_found_message(query: &str) -> String {
    format!(
        "❌ {} {}",
        escape("No record found for"),
        bold(&escape(&echoed_query(query)))
    )
}

/// Reply for a failed search, chosen by error kind
pub fn error_message(error: &LookupError) -> String {
    match error {
        LookupError::InvalidQuery(reason) => format!(
            "⚠️ {}\n\n{}",
            escape(&format!("Invalid query: {}.", reason)),
            usage_message()
        ),
        LookupError::SourceUnavailable(DocumentKind::Manifest, _) => format!(
            "⏳ {}",
            escape("The record index is unavailable right now. Please try again later.")
        ),
        LookupError::SourceUnavailable(DocumentKind::Shard, _) => format!(
            "📦 {}",
            escape("The shard holding this number is unavailable right now. Please try again later.")
        ),
        LookupError::ParseError(_) => format!(
            "🛠️ {}",
            escape("The record data could not be read. The problem has been logged.")
        ),
    }
}

/// Reply for commands the bot does not know
pub fn unknown_command_message(command: &str) -> String {
    format!(
        "{}\n\n{}",
        escape(&format!("Unknown command /{}.", command)),
        usage_message()
    )
}

/// Reply for photos, stickers and other non-text messages
pub fn unsupported_message() -> String {
    escape("Only text messages are supported. Send a phone number or an email address.")
}
