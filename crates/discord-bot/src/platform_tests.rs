//! Serenity platform tests against a wiremock Discord API, routed through
//! serenity's `HttpBuilder::proxy()`.

use super::*;
use discord_types::{Emoji, OptionType};
use serenity::model::id::ApplicationId;
use wiremock::matchers::{body_string_contains, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn proxy_http(proxy_url: &str) -> Arc<Http> {
    Arc::new(
        serenity::http::HttpBuilder::new("fake-token")
            .proxy(proxy_url)
            .ratelimiter_disabled(true)
            .application_id(ApplicationId::new(1))
            .build(),
    )
}

fn platform(server: &MockServer) -> SerenityPlatform {
    SerenityPlatform::new(proxy_http(&server.uri()), Arc::new(Cache::new()))
}

fn user_json(id: &str, username: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "username": username,
        "discriminator": "0",
        "global_name": null,
        "avatar": null,
        "bot": false
    })
}

#[tokio::test]
async fn test_application_ready_follows_application_id() {
    let server = MockServer::start().await;
    assert!(platform(&server).application_ready());

    let http = Arc::new(serenity::http::HttpBuilder::new("fake-token").build());
    let unready = SerenityPlatform::new(http.clone(), Arc::new(Cache::new()));
    assert!(!unready.application_ready());

    http.set_application_id(ApplicationId::new(42));
    assert!(unready.application_ready());
    assert!(unready.bot_username().is_none());
    assert!(unready.cached_guild_ids().is_empty());
}

#[tokio::test]
async fn test_set_guild_commands_bulk_overwrites() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/v10/applications/1/guilds/5/commands"))
        .and(body_string_contains("\"name\":\"ping\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .expect(1)
        .mount(&server)
        .await;

    platform(&server)
        .set_guild_commands(5, &[CommandDefinition::chat_input("ping", "Check latency")])
        .await
        .unwrap();
    server.verify().await;
}

#[tokio::test]
async fn test_set_global_commands_empty_list() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/v10/applications/1/commands"))
        .and(body_string_contains("[]"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .expect(1)
        .mount(&server)
        .await;

    platform(&server).set_global_commands(&[]).await.unwrap();
    server.verify().await;
}

#[tokio::test]
async fn test_missing_access_becomes_platform_error() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/v10/applications/1/commands"))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_json(serde_json::json!({"code": 50001, "message": "Missing Access"})),
        )
        .mount(&server)
        .await;

    let err = platform(&server)
        .set_global_commands(&[CommandDefinition::chat_input("ping", "Check latency")])
        .await
        .unwrap_err();
    match err {
        Error::Platform(message) => {
            assert!(message.contains("set global commands"), "{}", message);
            assert!(message.contains("Missing Access"), "{}", message);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_fetch_global_commands_parses_snapshot() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v10/applications/1/commands"))
        .and(query_param("with_localizations", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
            "id": "10",
            "application_id": "1",
            "version": "1",
            "type": 1,
            "name": "echo",
            "description": "Repeat text",
            "default_member_permissions": null,
            "dm_permission": true,
            "nsfw": false,
            "options": [{
                "type": 3,
                "name": "text",
                "description": "What to repeat",
                "required": true
            }]
        }])))
        .mount(&server)
        .await;

    let remote = platform(&server).fetch_global_commands().await.unwrap();
    assert_eq!(remote.len(), 1);
    assert_eq!(remote[0].id, 10);
    assert_eq!(remote[0].guild_id, None);
    assert_eq!(remote[0].name(), "echo");
    assert_eq!(remote[0].definition.options.len(), 1);
    assert_eq!(remote[0].definition.options[0].kind, OptionType::String);
    assert!(remote[0].definition.options[0].required);
}

#[tokio::test]
async fn test_fetch_guild_commands_requests_localizations() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v10/applications/1/guilds/5/commands"))
        .and(query_param("with_localizations", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
            "id": "11",
            "application_id": "1",
            "guild_id": "5",
            "version": "1",
            "type": 1,
            "name": "ping",
            "name_localizations": { "de": "pingen" },
            "description": "Check latency",
            "description_localizations": { "de": "Latenz messen" },
            "default_member_permissions": null,
            "nsfw": false
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let remote = platform(&server).fetch_guild_commands(5).await.unwrap();
    server.verify().await;
    assert_eq!(remote.len(), 1);
    assert_eq!(remote[0].guild_id, Some(5));
    let names = remote[0].definition.name_localizations.as_ref().unwrap();
    assert_eq!(names.get("de").map(String::as_str), Some("pingen"));
    let descriptions = remote[0].definition.description_localizations.as_ref().unwrap();
    assert_eq!(descriptions.get("de").map(String::as_str), Some("Latenz messen"));
}

#[tokio::test]
async fn test_login_records_username() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v10/users/@me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json("9", "helper")))
        .expect(1)
        .mount(&server)
        .await;

    let platform = platform(&server);
    platform.login("fake-token").await.unwrap();
    assert_eq!(platform.bot_username().as_deref(), Some("helper"));
}

#[tokio::test]
async fn test_fetch_user() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v10/users/5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json("5", "alice")))
        .mount(&server)
        .await;

    let user = platform(&server).fetch_user(5).await.unwrap();
    assert_eq!(user.id, 5);
    assert_eq!(user.username, "alice");
    assert!(!user.bot);
}

#[tokio::test]
async fn test_remove_reaction_deletes_users_reaction() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path_regex(r"^/api/v10/channels/600/messages/700/reactions/.+/5$"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let reaction = Reaction {
        channel_id: 600,
        message_id: 700,
        guild_id: Some(1),
        emoji: Emoji::custom(77, "party"),
        count: None,
        partial: true,
    };
    platform(&server).remove_reaction(&reaction, 5).await.unwrap();
    server.verify().await;
}

#[tokio::test]
async fn test_reply_references_the_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v10/channels/600/messages"))
        .and(body_string_contains("unknown command"))
        .and(body_string_contains("message_reference"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let message = DiscordMessage {
        id: 500,
        channel_id: 600,
        guild_id: Some(1),
        author: DiscordUser {
            id: 5,
            username: "alice".to_string(),
            global_name: None,
            bot: false,
        },
        content: "!nope".to_string(),
    };
    // A 204 carries no message body to decode; only the request matters here.
    let _ = platform(&server).reply(&message, "unknown command").await;
    server.verify().await;
}
