//! Bots Long Poll session handling and end-to-end polling against mockito.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use dbot_core::{DbotError, ListenerPolicy, PollingConfig, UpdateSource};
use dbot_vk::{LongPollSession, VkBot, VkClient, VkConfig, VkSource};
use mockito::{Matcher, Mock, ServerGuard};
use serde_json::json;
use tokio::sync::mpsc;

const GROUP_ID: i64 = 77;

fn config_for(server: &ServerGuard) -> VkConfig {
    VkConfig::new("vk_token", GROUP_ID)
        .with_api_url(format!("{}/method", server.url()))
        .with_wait(Duration::ZERO)
}

fn source_for(server: &ServerGuard) -> VkSource {
    let config = config_for(server);
    VkSource::new(Arc::new(VkClient::new(&config).unwrap()), GROUP_ID, config.wait)
}

fn session(server: &ServerGuard, key: &str, ts: &str) -> LongPollSession {
    LongPollSession {
        server: format!("{}/lp", server.url()),
        key: key.into(),
        ts: ts.into(),
    }
}

async fn mock_session_server(server: &mut ServerGuard, key: &str, ts: &str) -> Mock {
    let body = json!({
        "response": {"server": format!("{}/lp", server.url()), "key": key, "ts": ts}
    });
    server
        .mock("POST", "/method/groups.getLongPollServer")
        .match_body(Matcher::UrlEncoded("group_id".into(), GROUP_ID.to_string()))
        .with_status(200)
        .with_body(body.to_string())
        .create_async()
        .await
}

async fn mock_check(server: &mut ServerGuard, key: &str, ts: &str, body: serde_json::Value) -> Mock {
    server
        .mock("GET", "/lp")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("act".into(), "a_check".into()),
            Matcher::UrlEncoded("key".into(), key.into()),
            Matcher::UrlEncoded("ts".into(), ts.into()),
            Matcher::UrlEncoded("wait".into(), "0".into()),
        ]))
        .with_status(200)
        .with_body(body.to_string())
        .create_async()
        .await
}

fn message_new(id: i64) -> serde_json::Value {
    json!({
        "type": "message_new",
        "object": {
            "message": {
                "id": id, "date": 1, "peer_id": 5, "from_id": 5, "out": 0, "text": "hello",
                "conversation_message_id": id, "attachments": [], "fwd_messages": [], "important": false
            },
            "client_info": {"button_actions": ["text"], "keyboard": true, "inline_keyboard": false, "carousel": false, "lang_id": 3}
        },
        "group_id": GROUP_ID,
        "event_id": "e1"
    })
}

#[tokio::test]
async fn test_init_requests_session() {
    let mut server = mockito::Server::new_async().await;
    let mock = mock_session_server(&mut server, "KEY", "10").await;

    let cursor = source_for(&server).init().await.unwrap();

    assert_eq!(cursor, session(&server, "KEY", "10"));
    mock.assert_async().await;
}

/// **Test: The next cursor carries the ts from the response; updates come through in order.**
#[tokio::test]
async fn test_fetch_advances_ts() {
    let mut server = mockito::Server::new_async().await;
    let _check = mock_check(
        &mut server,
        "KEY",
        "10",
        json!({"ts": "12", "updates": [message_new(1), {"type": "wall_post_new", "object": {}}]}),
    )
    .await;

    let batch = source_for(&server)
        .fetch(&session(&server, "KEY", "10"))
        .await
        .unwrap();

    assert_eq!(batch.next_cursor, session(&server, "KEY", "12"));
    assert_eq!(batch.items.len(), 2);
    assert_eq!(batch.items[0].kind, "message_new");
    assert_eq!(batch.items[1].kind, "wall_post_new");
}

#[tokio::test]
async fn test_failed_1_adopts_new_ts() {
    let mut server = mockito::Server::new_async().await;
    let _check = mock_check(&mut server, "KEY", "10", json!({"failed": 1, "ts": 30})).await;

    let batch = source_for(&server)
        .fetch(&session(&server, "KEY", "10"))
        .await
        .unwrap();

    assert!(batch.items.is_empty());
    assert_eq!(batch.next_cursor, session(&server, "KEY", "30"));
}

#[tokio::test]
async fn test_failed_2_renews_key_and_keeps_ts() {
    let mut server = mockito::Server::new_async().await;
    let _check = mock_check(&mut server, "KEY", "10", json!({"failed": 2})).await;
    let renew = mock_session_server(&mut server, "KEY2", "99").await;

    let batch = source_for(&server)
        .fetch(&session(&server, "KEY", "10"))
        .await
        .unwrap();

    assert!(batch.items.is_empty());
    assert_eq!(batch.next_cursor, session(&server, "KEY2", "10"));
    renew.assert_async().await;
}

#[tokio::test]
async fn test_failed_3_renews_whole_session() {
    let mut server = mockito::Server::new_async().await;
    let _check = mock_check(&mut server, "KEY", "10", json!({"failed": 3})).await;
    let _renew = mock_session_server(&mut server, "KEY3", "99").await;

    let batch = source_for(&server)
        .fetch(&session(&server, "KEY", "10"))
        .await
        .unwrap();

    assert_eq!(batch.next_cursor, session(&server, "KEY3", "99"));
}

#[tokio::test]
async fn test_unknown_failed_code_is_an_error() {
    let mut server = mockito::Server::new_async().await;
    let _check = mock_check(&mut server, "KEY", "10", json!({"failed": 4})).await;

    let err = source_for(&server)
        .fetch(&session(&server, "KEY", "10"))
        .await
        .unwrap_err();

    assert!(matches!(err, DbotError::Api { code: 4, .. }), "got {:?}", err);
}

/// **Test: start_polling obtains the session, dispatches message_new, and follows ts.**
#[tokio::test]
async fn test_bot_polls_and_dispatches() {
    let mut server = mockito::Server::new_async().await;
    let _session = mock_session_server(&mut server, "KEY", "10").await;
    let first = mock_check(
        &mut server,
        "KEY",
        "10",
        json!({"ts": "11", "updates": [message_new(1)]}),
    )
    .await;
    let idle = mock_check(&mut server, "KEY", "11", json!({"ts": "11", "updates": []})).await;

    let bot = VkBot::with_options(
        config_for(&server),
        ListenerPolicy::Isolate,
        PollingConfig::default().without_delay(),
    )
    .unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let (tx, mut rx) = mpsc::unbounded_channel();
    {
        let seen = Arc::clone(&seen);
        bot.on_message(move |args| {
            let keyboard = args.capability.as_ref().map(|c| c.keyboard);
            seen.lock()
                .unwrap()
                .push((args.message.id, args.sender.user_id(), keyboard));
            let _ = tx.send(());
            Ok(())
        });
    }

    bot.start_polling().await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("message listener not called")
        .unwrap();
    while !idle.matched_async().await {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    bot.stop_polling();
    let polled = bot.join().await.unwrap().unwrap();

    assert_eq!(polled.cursor.ts, "11");
    assert_eq!(*seen.lock().unwrap(), vec![(1, 5, Some(true))]);
    first.assert_async().await;
}

/// **Test: If the session cannot be obtained, start_polling fails and the bot stays idle.**
#[tokio::test]
async fn test_start_fails_when_session_unavailable() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/method/groups.getLongPollServer")
        .with_status(200)
        .with_body(r#"{"error": {"error_code": 15, "error_msg": "Access denied"}}"#)
        .create_async()
        .await;

    let bot = VkBot::new(config_for(&server)).unwrap();
    let err = bot.start_polling().await.unwrap_err();

    assert!(matches!(err, DbotError::Api { code: 15, .. }));
    assert!(!bot.is_polling());
    assert!(bot.join().await.unwrap().is_none());
}
