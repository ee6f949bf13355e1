//! Built-in VK classification rules, keyed on the long-poll event `type`.

use std::sync::Arc;

use dbot_core::{ApiTransport, EventKind, HandlerError, MatchRule};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::args::{VkArgument, VkMessageArgs, VkUserEventArgs};
use crate::types::{ClientInfo, Message, MessageNew, UpdateItem};
use crate::users::UserResolver;

pub type VkRule = MatchRule<VkEvent, UpdateItem, VkArgument>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VkEvent {
    Message,
    MessageReply,
    MessageEdit,
    MessageAllow,
    MessageDeny,
}

impl EventKind for VkEvent {
    fn label(&self) -> &'static str {
        match self {
            VkEvent::Message => "message",
            VkEvent::MessageReply => "message_reply",
            VkEvent::MessageEdit => "message_edit",
            VkEvent::MessageAllow => "message_allow",
            VkEvent::MessageDeny => "message_deny",
        }
    }
}

impl VkEvent {
    pub const ALL: [VkEvent; 5] = [
        VkEvent::Message,
        VkEvent::MessageReply,
        VkEvent::MessageEdit,
        VkEvent::MessageAllow,
        VkEvent::MessageDeny,
    ];

    /// Long-poll `type` this kind reacts to.
    pub fn update_type(self) -> &'static str {
        match self {
            VkEvent::Message => "message_new",
            VkEvent::MessageReply => "message_reply",
            VkEvent::MessageEdit => "message_edit",
            VkEvent::MessageAllow => "message_allow",
            VkEvent::MessageDeny => "message_deny",
        }
    }

    pub fn test(self, update: &UpdateItem) -> bool {
        update.kind == self.update_type()
    }

    pub fn handle(
        self,
        update: &UpdateItem,
        api: &Arc<dyn ApiTransport>,
    ) -> Result<VkArgument, HandlerError> {
        match self {
            VkEvent::Message => {
                let (message, capability) = if update.object.get("message").is_some() {
                    let current: MessageNew = parse(&update.object)?;
                    (current.message, current.client_info)
                } else {
                    (parse::<Message>(&update.object)?, None)
                };
                Ok(message_args(message, capability, api))
            }
            VkEvent::MessageReply | VkEvent::MessageEdit => {
                let message: Message = parse(&update.object)?;
                Ok(message_args(message, None, api))
            }
            VkEvent::MessageAllow | VkEvent::MessageDeny => {
                let user_id = update
                    .object
                    .get("user_id")
                    .and_then(Value::as_i64)
                    .ok_or(HandlerError::MissingField("user_id"))?;
                Ok(VkArgument::UserEvent(VkUserEventArgs {
                    event: update.object.clone(),
                    user: UserResolver::new(Arc::clone(api), user_id),
                }))
            }
        }
    }

    pub fn rule(self, api: Arc<dyn ApiTransport>) -> Arc<VkRule> {
        MatchRule::new(
            self,
            move |update: &UpdateItem| self.test(update),
            move |update: &UpdateItem| self.handle(update, &api),
        )
    }
}

fn parse<T: DeserializeOwned>(object: &Value) -> Result<T, HandlerError> {
    serde_json::from_value(object.clone()).map_err(|e| HandlerError::Payload(e.to_string()))
}

fn message_args(
    message: Message,
    capability: Option<ClientInfo>,
    api: &Arc<dyn ApiTransport>,
) -> VkArgument {
    VkArgument::Message(VkMessageArgs {
        sender: UserResolver::new(Arc::clone(api), message.from_id),
        message,
        capability,
    })
}

/// Every built-in rule, in [`VkEvent::ALL`] order.
pub fn builtin_rules(api: Arc<dyn ApiTransport>) -> Vec<Arc<VkRule>> {
    VkEvent::ALL
        .into_iter()
        .map(|kind| kind.rule(Arc::clone(&api)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dbot_core::Matcher;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers `users.get` with the requested id; counts calls.
    #[derive(Default)]
    struct UsersApi {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ApiTransport for UsersApi {
        async fn request(&self, method: &str, params: Value) -> dbot_core::Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(method, "users.get");
            Ok(json!([{
                "id": params["user_ids"],
                "first_name": "Pavel",
                "last_name": "Durov"
            }]))
        }
    }

    fn message_json() -> Value {
        json!({
            "id": 1,
            "date": 1,
            "peer_id": 2000000001,
            "from_id": 1,
            "out": 0,
            "text": "test",
            "conversation_message_id": 0,
            "attachments": [],
            "fwd_messages": [],
            "important": false
        })
    }

    fn api() -> Arc<dyn ApiTransport> {
        Arc::new(UsersApi::default())
    }

    fn kinds(update: &UpdateItem) -> Vec<VkEvent> {
        Matcher::with_rules(builtin_rules(api()))
            .get_matches(update)
            .iter()
            .map(|r| r.kind())
            .collect()
    }

    #[test]
    fn test_message_new_current_shape() {
        let update = UpdateItem::new(
            "message_new",
            json!({
                "message": message_json(),
                "client_info": {
                    "button_actions": ["text", "vkpay"],
                    "keyboard": true,
                    "inline_keyboard": true,
                    "carousel": false,
                    "lang_id": 0
                }
            }),
        );

        assert_eq!(kinds(&update), vec![VkEvent::Message]);
        let argument = VkEvent::Message.handle(&update, &api()).unwrap();
        let args = argument.as_message().unwrap();
        assert_eq!(args.message.text, "test");
        let capability = args.capability.as_ref().unwrap();
        assert!(capability.keyboard);
        assert_eq!(capability.button_actions, vec!["text", "vkpay"]);
        assert_eq!(args.sender.user_id(), 1);
    }

    #[test]
    fn test_message_new_legacy_shape() {
        let update = UpdateItem::new("message_new", message_json());

        let argument = VkEvent::Message.handle(&update, &api()).unwrap();
        let args = argument.as_message().unwrap();
        assert_eq!(args.message.id, 1);
        assert!(args.capability.is_none());
    }

    #[test]
    fn test_reply_and_edit() {
        let reply = UpdateItem::new("message_reply", message_json());
        assert_eq!(kinds(&reply), vec![VkEvent::MessageReply]);
        let argument = VkEvent::MessageReply.handle(&reply, &api()).unwrap();
        assert!(argument.as_message().unwrap().capability.is_none());

        let edit = UpdateItem::new("message_edit", message_json());
        assert_eq!(kinds(&edit), vec![VkEvent::MessageEdit]);
    }

    #[test]
    fn test_allow_and_deny_carry_user() {
        let allow = UpdateItem::new("message_allow", json!({"user_id": 7, "key": "k"}));
        assert_eq!(kinds(&allow), vec![VkEvent::MessageAllow]);
        let argument = VkEvent::MessageAllow.handle(&allow, &api()).unwrap();
        let args = argument.as_user_event().unwrap();
        assert_eq!(args.user.user_id(), 7);
        assert_eq!(args.event["key"], "k");

        let deny = UpdateItem::new("message_deny", json!({"user_id": 8}));
        assert_eq!(kinds(&deny), vec![VkEvent::MessageDeny]);
    }

    #[test]
    fn test_unknown_type_matches_nothing() {
        let update = UpdateItem::new("wall_post_new", json!({"id": 1}));
        assert!(kinds(&update).is_empty());
    }

    #[test]
    fn test_malformed_object_is_transform_error() {
        let update = UpdateItem::new("message_edit", json!({"text": "no ids"}));
        assert!(matches!(
            VkEvent::MessageEdit.handle(&update, &api()),
            Err(HandlerError::Payload(_))
        ));

        let deny = UpdateItem::new("message_deny", json!({}));
        assert_eq!(
            VkEvent::MessageDeny.handle(&deny, &api()).unwrap_err(),
            HandlerError::MissingField("user_id")
        );
    }

    /// **Test: The sender is fetched with users.get only when awaited.**
    #[tokio::test]
    async fn test_sender_lookup_is_lazy() {
        let stub = Arc::new(UsersApi::default());
        let api: Arc<dyn ApiTransport> = stub.clone();
        let update = UpdateItem::new("message_new", message_json());

        let argument = VkEvent::Message.handle(&update, &api).unwrap();
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);

        let user = argument.as_message().unwrap().sender.get(&[]).await.unwrap();
        assert_eq!(user.id, 1);
        assert_eq!(user.first_name, "Pavel");
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
    }
}
