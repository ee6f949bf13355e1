//! End-to-end: getUpdates served by mockito, dispatched through the built-in rules to listeners.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use dbot_core::{DbotError, ListenerPolicy, PollingConfig};
use dbot_telegram::{TelegramBot, TelegramConfig, TelegramEvent};
use mockito::Matcher;
use serde_json::json;
use tokio::sync::mpsc;

const TOKEN: &str = "test_bot_token_12345";

fn bot_for(server: &mockito::ServerGuard) -> TelegramBot {
    let config = TelegramConfig::with_token(TOKEN)
        .with_api_url(server.url())
        .with_poll_timeout(Duration::ZERO);
    TelegramBot::with_options(
        config,
        ListenerPolicy::Isolate,
        PollingConfig::default().without_delay(),
    )
    .unwrap()
}

fn updates_path() -> String {
    format!("/bot{}/getUpdates", TOKEN)
}

/// **Test: First poll has no offset, the next uses last update_id + 1; listeners see the command.**
#[tokio::test]
async fn test_polling_dispatches_and_advances_offset() {
    let mut server = mockito::Server::new_async().await;
    let first = server
        .mock("POST", updates_path().as_str())
        .match_body(Matcher::Json(json!({"timeout": 0})))
        .with_status(200)
        .with_body(
            json!({
                "ok": true,
                "result": [{
                    "update_id": 1,
                    "message": {
                        "message_id": 10,
                        "date": 1706529600,
                        "chat": {"id": 123, "type": "private"},
                        "from": {"id": 5, "is_bot": false, "first_name": "Ann"},
                        "text": "/start now",
                        "entities": [{"type": "bot_command", "offset": 0, "length": 6}]
                    }
                }]
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;
    let next = server
        .mock("POST", updates_path().as_str())
        .match_body(Matcher::Json(json!({"offset": 2, "timeout": 0})))
        .with_status(200)
        .with_body(r#"{"ok": true, "result": []}"#)
        .expect_at_least(1)
        .create_async()
        .await;

    let bot = bot_for(&server);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let (tx, mut rx) = mpsc::unbounded_channel();
    {
        let seen = Arc::clone(&seen);
        bot.on_message(move |args| {
            seen.lock().unwrap().push(format!("message:{}", args.message.message_id));
            Ok(())
        });
    }
    {
        let seen = Arc::clone(&seen);
        bot.on_command(move |command| {
            seen.lock()
                .unwrap()
                .push(format!("command:{}:{}", command.command, command.starts));
            let _ = tx.send(());
            Ok(())
        });
    }

    bot.start_polling().await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("command listener not called")
        .unwrap();
    // Let the loop issue at least one request with the advanced offset.
    while !next.matched_async().await {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    bot.stop_polling();
    let session = bot.join().await.unwrap().unwrap();

    assert_eq!(session.cursor, Some(2));
    assert_eq!(
        *seen.lock().unwrap(),
        vec!["message:10".to_string(), "command:/start:true".to_string()]
    );
    first.assert_async().await;
    next.assert_async().await;
}

/// **Test: An undecodable update is skipped; its neighbour is dispatched and the offset moves past both.**
#[tokio::test]
async fn test_malformed_update_does_not_stall_polling() {
    let mut server = mockito::Server::new_async().await;
    let _first = server
        .mock("POST", updates_path().as_str())
        .match_body(Matcher::Json(json!({"timeout": 0})))
        .with_status(200)
        .with_body(
            json!({
                "ok": true,
                "result": [
                    {"update_id": 7, "message": {"message_id": "broken", "chat": 1}},
                    {
                        "update_id": 8,
                        "message": {
                            "message_id": 11,
                            "date": 1706529600,
                            "chat": {"id": 123, "type": "private"},
                            "text": "still here"
                        }
                    }
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;
    let next = server
        .mock("POST", updates_path().as_str())
        .match_body(Matcher::Json(json!({"offset": 9, "timeout": 0})))
        .with_status(200)
        .with_body(r#"{"ok": true, "result": []}"#)
        .expect_at_least(1)
        .create_async()
        .await;

    let bot = bot_for(&server);
    let (tx, mut rx) = mpsc::unbounded_channel();
    bot.on_message(move |args| {
        let _ = tx.send(args.message.message_id);
        Ok(())
    });

    bot.start_polling().await.unwrap();
    let seen = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("message listener not called")
        .unwrap();
    while !next.matched_async().await {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    bot.stop_polling();
    let session = bot.join().await.unwrap().unwrap();

    assert_eq!(seen, 11);
    assert_eq!(session.cursor, Some(9));
    assert_eq!(session.consecutive_failures, 0);
}

/// **Test: A server failing every call ends polling with PollingExhausted after exactly 4 calls.**
#[tokio::test]
async fn test_failing_server_exhausts_after_four_attempts() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", updates_path().as_str())
        .with_status(500)
        .with_body("internal error")
        .expect(4)
        .create_async()
        .await;

    let bot = bot_for(&server);
    bot.start_polling().await.unwrap();
    let err = tokio::time::timeout(Duration::from_secs(5), bot.join())
        .await
        .expect("polling did not terminate")
        .unwrap_err();

    assert!(matches!(err, DbotError::PollingExhausted { failures: 4 }), "got {:?}", err);
    assert!(!bot.is_polling());
    mock.assert_async().await;
}

/// **Test: Starting twice runs a single loop.**
#[tokio::test]
async fn test_start_polling_twice_is_a_no_op() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", updates_path().as_str())
        .with_status(200)
        .with_body(r#"{"ok": true, "result": []}"#)
        .create_async()
        .await;

    let bot = bot_for(&server);
    bot.start_polling().await.unwrap();
    bot.start_polling().await.unwrap();
    assert!(bot.is_polling());

    bot.stop_polling();
    assert!(!bot.is_polling());
    let session = bot.join().await.unwrap().unwrap();
    assert_eq!(session.cursor, None);
    assert!(!session.active);
}

#[tokio::test]
async fn test_handle_update_without_polling() {
    let server = mockito::Server::new_async().await;
    let bot = bot_for(&server);
    let count = Arc::new(Mutex::new(0));
    {
        let count = Arc::clone(&count);
        bot.on(TelegramEvent::Media, move |argument| {
            assert_eq!(argument.as_media().unwrap().media.kind, "photo");
            *count.lock().unwrap() += 1;
            Ok(())
        });
    }
    let update = serde_json::from_value(json!({
        "update_id": 3,
        "message": {
            "message_id": 1,
            "date": 0,
            "chat": {"id": 1, "type": "private"},
            "photo": []
        }
    }))
    .unwrap();

    let report = bot.handle_update(&update).unwrap();

    assert_eq!(report.matched, 3);
    assert_eq!(*count.lock().unwrap(), 1);
}
