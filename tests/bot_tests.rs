use record_lookup_bot::bot::ui_builder::{error_message, not_found_message, welcome_message};
use record_lookup_bot::bot::{format_record, parse_command, BotCommand};
use record_lookup_bot::errors::DocumentKind;
use record_lookup_bot::{LookupError, Record};

#[cfg(test)]
mod tests {
    use super::*;

    fn record(json: &str) -> Record {
        serde_json::from_str(json).expect("test record should be valid JSON")
    }

    /// Plain text (no leading slash) is never a command
    #[test]
    fn test_plain_text_is_a_query() {
        for text in ["9711102028", "+97-1110-2028", "alice@example.com", "search 123"] {
            assert_eq!(parse_command(text), None, "{:?} parsed as a command", text);
        }
    }

    /// Group chats send commands with the bot's username attached
    #[test]
    fn test_commands_in_group_chats() {
        assert_eq!(parse_command("/help@record_lookup_bot"), Some(BotCommand::Help));
        assert_eq!(
            parse_command("/search@record_lookup_bot   alice@example.com  "),
            Some(BotCommand::Search(Some("alice@example.com".to_string())))
        );
        assert_eq!(
            parse_command("/search@record_lookup_bot"),
            Some(BotCommand::Search(None))
        );
    }

    /// Every dynamic piece of a record reply is MarkdownV2-escaped
    #[test]
    fn test_record_reply_escapes_all_fields() {
        let text = format_record(&record(
            r#"{"Name": "J. Doe [admin]", "Address": "12-B, Ring Rd. (North)", "Score": 9.5, "Tags": ["a_b"]}"#,
        ));

        assert!(text.contains("J\\. Doe \\[admin\\]"));
        assert!(text.contains("12\\-B, Ring Rd\\. \\(North\\)"));
        assert!(text.contains("9\\.5"));
        assert!(text.contains("\\[\"a\\_b\"\\]"));
        assert!(text.starts_with("🔎 *Record found*"));
    }

    #[test]
    fn test_replies_for_missing_records_and_errors() {
        assert!(not_found_message("alice@example.com").contains("alice@example\\.com"));

        let reply = error_message(&LookupError::InvalidQuery(
            "query has 3 digits, at least 7 required".to_string(),
        ));
        assert!(reply.contains("at least 7 required"));

        let reply = error_message(&LookupError::unavailable(
            DocumentKind::Shard,
            "shard download failed",
        ));
        assert!(!reply.contains("shard download failed"));
        assert!(reply.contains("shard"));

        let reply = error_message(&LookupError::unavailable(
            DocumentKind::Manifest,
            "no pinned message",
        ));
        assert!(reply.contains("try again later"));
    }

    #[test]
    fn test_welcome_is_valid_markdown_v2() {
        let text = welcome_message();
        assert!(text.contains("alive\\!"));
        // Reserved characters outside formatting must be escaped
        for reserved in ['.', '!', '-', '(', ')', '+'] {
            for (i, c) in text.char_indices() {
                if c == reserved {
                    assert_eq!(
                        &text[i - 1..i],
                        "\\",
                        "unescaped {:?} in welcome message",
                        reserved
                    );
                }
            }
        }
    }
}
