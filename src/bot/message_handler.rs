//! Message Handler module for processing incoming Telegram messages

use anyhow::Result;
use std::time::Instant;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::{debug, Instrument};

use super::command_handlers::{
    handle_help_command, handle_search_command, handle_start_command, handle_unknown_command,
    parse_command, run_search, BotCommand,
};
use super::ui_builder::unsupported_message;
use crate::observability;
use crate::search::SearchService;

/// Entry point for every message update
pub async fn message_handler(bot: Bot, msg: Message, search: SearchService) -> Result<()> {
    let span = observability::telegram_span(
        "message_handler",
        msg.from.as_ref().map(|u| u.id.0 as i64),
    );

    async move {
        let start_time = Instant::now();
        let message_type = match msg.text() {
            Some(text) if text.trim_start().starts_with('/') => "command",
            Some(_) => "text",
            None => "unsupported",
        };
        observability::metrics::record_telegram_message(message_type);

        let result = match msg.text() {
            Some(text) => handle_text_message(&bot, &msg, &search, text).await,
            None => handle_unsupported_message(&bot, &msg).await,
        };

        observability::metrics::record_telegram_response(message_type, start_time.elapsed());
        result
    }
    .instrument(span)
    .await
}

/// Dispatch a text message: commands to their handlers, anything else is a query
async fn handle_text_message(
    bot: &Bot,
    msg: &Message,
    search: &SearchService,
    text: &str,
) -> Result<()> {
    match parse_command(text) {
        Some(BotCommand::Start) => handle_start_command(bot, msg).await,
        Some(BotCommand::Help) => handle_help_command(bot, msg, search).await,
        Some(BotCommand::Search(query)) => {
            handle_search_command(bot, msg, search, query.as_deref()).await
        }
        Some(BotCommand::Unknown(command)) => handle_unknown_command(bot, msg, &command).await,
        None => {
            debug!(user_id = %msg.chat.id, "Treating plain text as a search query");
            run_search(bot, msg, search, text).await
        }
    }
}

/// Handle unsupported message types
async fn handle_unsupported_message(bot: &Bot, msg: &Message) -> Result<()> {
    debug!(user_id = %msg.chat.id, "Unsupported message type");
    bot.send_message(msg.chat.id, unsupported_message())
        .parse_mode(ParseMode::MarkdownV2)
        .await?;
    Ok(())
}
