//! Telegram Bot API integration
//!
//! Inbound updates arrive by long polling and are translated into events;
//! outbound effects go through [`TelegramClient`], which implements the
//! runtime's `Transport`.

mod client;
mod error;
pub mod inbound;
mod notifier;
mod poller;
pub mod types;

pub use client::{TelegramClient, DEFAULT_API_URL};
pub use notifier::TelegramOperatorNotifier;
pub use poller::{prepare, Poller};
