//! Command Handlers module for processing bot commands

use anyhow::Result;
use lazy_static::lazy_static;
use regex::Regex;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::{debug, info};

use super::ui_builder::{
    error_message, format_record, help_message, not_found_message, unknown_command_message,
    usage_message, welcome_message,
};
use crate::errors::{error_logging, LookupError};
use crate::query::normalize_query;
use crate::search::SearchService;

lazy_static! {
    /// `/name`, an optional `@botname` suffix, then free-form arguments
    static ref COMMAND_PATTERN: Regex =
        Regex::new(r"(?s)^/([A-Za-z0-9_]+)(?:@[A-Za-z0-9_]+)?(?:\s+(.*))?$")
            .expect("Invalid command regex pattern");
}

/// A command the bot understands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Help,
    /// `/search` with its argument, `None` when it was left out
    Search(Option<String>),
    Unknown(String),
}

/// Parse a message as a bot command.
///
/// Returns `None` for text that is not a command at all.
pub fn parse_command(text: &str) -> Option<BotCommand> {
    let captures = COMMAND_PATTERN.captures(text.trim())?;
    let name = captures.get(1)?.as_str().to_ascii_lowercase();
    let args = captures
        .get(2)
        .map(|m| m.as_str().trim())
        .filter(|args| !args.is_empty())
        .map(str::to_string);

    Some(match name.as_str() {
        "start" => BotCommand::Start,
        "help" => BotCommand::Help,
        "search" => BotCommand::Search(args),
        _ => BotCommand::Unknown(name),
    })
}

async fn send_markdown(bot: &Bot, chat_id: ChatId, text: String) -> Result<()> {
    bot.send_message(chat_id, text)
        .parse_mode(ParseMode::MarkdownV2)
        .await?;
    Ok(())
}

/// Handle the /start command
pub async fn handle_start_command(bot: &Bot, msg: &Message) -> Result<()> {
    debug!(user_id = %msg.chat.id, "Handling /start command");
    send_markdown(bot, msg.chat.id, welcome_message()).await
}

/// Handle the /help command
pub async fn handle_help_command(bot: &Bot, msg: &Message, search: &SearchService) -> Result<()> {
    let min_digits = search
        .sharded()
        .map(|sharded| sharded.min_digits())
        .unwrap_or(crate::query::MIN_QUERY_DIGITS);
    send_markdown(bot, msg.chat.id, help_message(min_digits)).await
}

/// Handle the /search command; a missing argument gets the usage hint
pub async fn handle_search_command(
    bot: &Bot,
    msg: &Message,
    search: &SearchService,
    query: Option<&str>,
) -> Result<()> {
    match query {
        Some(query) => run_search(bot, msg, search, query).await,
        None => send_markdown(bot, msg.chat.id, usage_message()).await,
    }
}

/// Handle commands the bot does not know
pub async fn handle_unknown_command(bot: &Bot, msg: &Message, command: &str) -> Result<()> {
    debug!(user_id = %msg.chat.id, command = %command, "Unknown command");
    send_markdown(bot, msg.chat.id, unknown_command_message(command)).await
}

/// Search for `query` and reply with the record or the reason there is none
pub async fn run_search(
    bot: &Bot,
    msg: &Message,
    search: &SearchService,
    query: &str,
) -> Result<()> {
    let user_id = msg.from.as_ref().map(|u| u.id.0 as i64);

    let reply = match search.search(query).await {
        Ok(Some(record)) => {
            info!(user_id = ?user_id, fields = record.len(), "Record found");
            format_record(&record)
        }
        Ok(None) => {
            info!(user_id = ?user_id, "No record found");
            not_found_message(query)
        }
        Err(e) => {
            // Only source and parse failures are logged
            if !matches!(e, LookupError::InvalidQuery(_)) {
                error_logging::log_lookup_error(
                    &e,
                    "search",
                    user_id,
                    None,
                    Some(normalize_query(query).len()),
                );
            }
            error_message(&e)
        }
    };

    send_markdown(bot, msg.chat.id, reply).await
}
