use crate::components::reminders::ReminderSink;
use crate::config::Config;
use crate::error::{telegram_error, BotResult};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::info;

/// The Telegram actor that processes messages
pub struct TelegramActor {
    config: Arc<RwLock<Config>>,
    client: Client,
    command_rx: mpsc::Receiver<TelegramCommand>,
}

/// Commands that can be sent to the Telegram actor
pub enum TelegramCommand {
    SendMessage(String, mpsc::Sender<BotResult<()>>),
    Shutdown,
}

/// Handle for communicating with the Telegram actor
#[derive(Clone)]
pub struct TelegramHandle {
    command_tx: mpsc::Sender<TelegramCommand>,
}

impl TelegramHandle {
    /// Send a message to the configured chat
    pub async fn send_message(&self, text: String) -> BotResult<()> {
        let (response_tx, mut response_rx) = mpsc::channel(1);
        self.command_tx
            .send(TelegramCommand::SendMessage(text, response_tx))
            .await
            .map_err(|e| telegram_error(&format!("Actor mailbox error: {}", e)))?;

        response_rx
            .recv()
            .await
            .ok_or_else(|| telegram_error("Response channel closed"))?
    }

    /// Shutdown the actor
    pub async fn shutdown(&self) -> BotResult<()> {
        let _ = self.command_tx.send(TelegramCommand::Shutdown).await;
        Ok(())
    }
}

#[async_trait]
impl ReminderSink for TelegramHandle {
    async fn deliver(&self, text: String) -> BotResult<()> {
        self.send_message(text).await
    }
}

impl TelegramActor {
    /// Create a new actor and return its handle
    pub fn new(config: Arc<RwLock<Config>>) -> (Self, TelegramHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);

        let actor = Self {
            config,
            client: Client::new(),
            command_rx,
        };

        let handle = TelegramHandle { command_tx };

        (actor, handle)
    }

    /// Start the actor's processing loop
    pub async fn run(&mut self) {
        info!("Telegram actor started");

        while let Some(cmd) = self.command_rx.recv().await {
            match cmd {
                TelegramCommand::SendMessage(text, response_tx) => {
                    let result = self.send_message(&text).await;
                    let _ = response_tx.send(result).await;
                }
                TelegramCommand::Shutdown => {
                    info!("Telegram actor shutting down");
                    break;
                }
            }
        }

        info!("Telegram actor shut down");
    }

    /// Deliver one message through the Bot API
    async fn send_message(&self, text: &str) -> BotResult<()> {
        let (token, chat_id) = {
            let config_read = self.config.read().await;
            (
                config_read.telegram_token.clone(),
                config_read.telegram_chat_id.clone(),
            )
        };

        let url = format!("https://api.telegram.org/bot{}/sendMessage", token);

        let response = self
            .client
            .post(&url)
            .json(&json!({
                "chat_id": chat_id,
                "text": text,
                "parse_mode": "HTML",
            }))
            .send()
            .await
            .map_err(|e| telegram_error(&format!("Failed to send message: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            return Err(telegram_error(&format!(
                "sendMessage returned HTTP {}: {}",
                status, error_body
            )));
        }

        info!("Sent to Telegram: {}", text);
        Ok(())
    }
}
