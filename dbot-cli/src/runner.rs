//! Runs one platform bot: config, tracing, logging listeners, polling until shutdown.

use std::fmt::Debug;
use std::future::Future;

use anyhow::{Context, Result};
use dbot_core::{init_tracing, DbotError, ListenerPolicy, PollingConfig, PollingSession};
use dbot_telegram::{TelegramBot, TelegramConfig};
use dbot_vk::{VkBot, VkConfig};
use tracing::{error, info};

pub const DEFAULT_LOG_FILE: &str = "logs/dbot.log";

/// Waits for the polling task to end. Ctrl+C requests a stop first, then waits for the loop to
/// finish its current batch.
pub async fn wait_for_shutdown<C, J, S>(
    join: J,
    stop: S,
) -> dbot_core::Result<Option<PollingSession<C>>>
where
    J: Future<Output = dbot_core::Result<Option<PollingSession<C>>>>,
    S: FnOnce(),
{
    tokio::pin!(join);
    tokio::select! {
        outcome = &mut join => outcome,
        _ = tokio::signal::ctrl_c() => {
            info!("received Ctrl+C; stopping polling");
            stop();
            join.await
        }
    }
}

/// Maps how polling ended to the process result. A given-up stream is an error (non-zero exit).
pub fn finish<C: Debug>(outcome: dbot_core::Result<Option<PollingSession<C>>>) -> Result<()> {
    match outcome {
        Ok(Some(session)) => {
            info!(cursor = ?session.cursor, "polling stopped");
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(e @ DbotError::PollingExhausted { .. }) => {
            error!(error = %e, "update stream unrecoverable");
            Err(anyhow::Error::new(e).context("polling terminated"))
        }
        Err(e) => Err(anyhow::Error::new(e)),
    }
}

fn start_logging(log_file: Option<&str>, platform: &str) -> Result<()> {
    let log_file = log_file.unwrap_or(DEFAULT_LOG_FILE);
    init_tracing(log_file).with_context(|| format!("init tracing to {}", log_file))?;
    info!(
        platform,
        started_at = %chrono::Local::now().to_rfc3339(),
        log_file,
        "dbot starting"
    );
    Ok(())
}

fn register_telegram_logging(bot: &TelegramBot) {
    bot.on_message(|args| {
        info!(
            chat_id = args.chat.id,
            message_id = args.message.message_id,
            from = ?args.sender.as_ref().map(|u| u.id),
            text = ?args.message.text_or_caption(),
            "message"
        );
        Ok(())
    });
    bot.on_command(|command| {
        info!(
            chat_id = command.args.chat.id,
            command = %command.command,
            starts = command.starts,
            "bot_command"
        );
        Ok(())
    });
    bot.on_media(|media| {
        info!(
            chat_id = media.args.chat.id,
            media_type = media.media.kind,
            "media"
        );
        Ok(())
    });
    bot.on_callback_query(|query| {
        info!(id = %query.id, from = query.from.id, data = ?query.data, "callback_query");
        Ok(())
    });
    bot.on_inline_query(|query| {
        info!(id = %query.id, from = query.from.id, query = %query.query, "inline_query");
        Ok(())
    });
}

fn register_vk_logging(bot: &VkBot) {
    bot.on_message(|args| {
        info!(
            peer_id = args.message.peer_id,
            from_id = args.message.from_id,
            text = %args.message.text,
            keyboard = ?args.capability.as_ref().map(|c| c.keyboard),
            "message"
        );
        Ok(())
    });
    bot.on_message_edit(|args| {
        info!(peer_id = args.message.peer_id, id = args.message.id, "message_edit");
        Ok(())
    });
    bot.on_message_allow(|args| {
        info!(user_id = args.user.user_id(), "message_allow");
        Ok(())
    });
    bot.on_message_deny(|args| {
        info!(user_id = args.user.user_id(), "message_deny");
        Ok(())
    });
}

pub async fn run_telegram(token: Option<String>) -> Result<()> {
    let config = TelegramConfig::load(token)?;
    start_logging(config.log_file.as_deref(), "telegram")?;

    let bot = TelegramBot::with_options(config, ListenerPolicy::Isolate, PollingConfig::from_env())?;
    register_telegram_logging(&bot);
    bot.start_polling().await.context("start telegram polling")?;

    finish(wait_for_shutdown(bot.join(), || bot.stop_polling()).await)
}

pub async fn run_vk(token: Option<String>) -> Result<()> {
    let config = VkConfig::load(token)?;
    start_logging(config.log_file.as_deref(), "vk")?;

    let bot = VkBot::with_options(config, ListenerPolicy::Isolate, PollingConfig::from_env())?;
    register_vk_logging(&bot);
    bot.start_polling().await.context("obtain VK long poll session")?;

    finish(wait_for_shutdown(bot.join(), || bot.stop_polling()).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wait_returns_when_loop_ends() {
        let outcome = wait_for_shutdown(
            async {
                Ok(Some(PollingSession {
                    active: false,
                    cursor: Some(3i64),
                    consecutive_failures: 0,
                }))
            },
            || panic!("stop must not be called"),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(outcome.cursor, Some(3));
    }

    #[test]
    fn test_exhausted_stream_is_an_error() {
        let outcome: dbot_core::Result<Option<PollingSession<()>>> =
            Err(DbotError::PollingExhausted { failures: 4 });
        let err = finish(outcome).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DbotError>(),
            Some(DbotError::PollingExhausted { failures: 4 })
        ));
    }

    #[test]
    fn test_clean_stop_is_ok() {
        assert!(finish::<()>(Ok(None)).is_ok());
        assert!(finish(Ok(Some(PollingSession {
            active: false,
            cursor: (),
            consecutive_failures: 0,
        })))
        .is_ok());
    }
}
