//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules:
//! - `command_handlers`: Parses `/start`, `/help` and `/search` and answers them
//! - `message_handler`: Entry point for incoming messages
//! - `ui_builder`: Formats records and replies as MarkdownV2

pub mod command_handlers;
pub mod message_handler;
pub mod ui_builder;

// Re-export main handler functions for use in main.rs
pub use command_handlers::{parse_command, BotCommand};
pub use message_handler::message_handler;
pub use ui_builder::format_record;
