use std::sync::atomic::{AtomicUsize, Ordering};

use discord_types::{Emoji, ModalSubmit};

use super::*;
use crate::client::ClientOptions;
use crate::declarations::ComponentMatcher;
use crate::error::Error;
use crate::handler::handler;
use crate::mock::{MockPlatform, PlatformCall};
use crate::registry::Registry;
use crate::testing::{built, counted, describe, reaction, returns, user};

fn click(custom_id: &str, kind: ComponentKind, guild_id: Option<u64>) -> ComponentInteraction {
    ComponentInteraction {
        id: 1,
        token: "t".to_string(),
        custom_id: custom_id.to_string(),
        kind,
        values: Vec::new(),
        guild_id,
        channel_id: 2,
        message_id: Some(3),
        user: user(5),
    }
}

fn batch(dispatch: Dispatch) -> Vec<Result<Option<HandlerOutput>>> {
    match dispatch {
        Dispatch::Batch(results) => results,
        other => panic!("expected a batch, got {:?}", other),
    }
}

fn outputs(results: &[Result<Option<HandlerOutput>>]) -> Vec<serde_json::Value> {
    results
        .iter()
        .filter_map(|r| r.as_ref().ok().cloned().flatten())
        .collect()
}

#[tokio::test]
async fn test_every_matching_button_runs() {
    let calls = Arc::new(AtomicUsize::new(0));
    let registry = Registry::new()
        .button(DeclaredComponent::exact("page-2", counted("exact", calls.clone())))
        .button(DeclaredComponent::new(
            ComponentMatcher::pattern(r"^page-\d+$").unwrap(),
            counted("pattern", calls.clone()),
        ))
        .button(DeclaredComponent::exact("other", counted("other", calls.clone())));
    let client = built(MockPlatform::ready("bot"), registry, ClientOptions::default()).await;

    let results = batch(
        client
            .execute_component(click("page-2", ComponentKind::Button, None))
            .await
            .unwrap(),
    );
    assert_eq!(outputs(&results), vec![serde_json::json!("exact"), serde_json::json!("pattern")]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_guild_filter_drops_matches_silently() {
    let registry = Registry::new()
        .button(DeclaredComponent::exact("vote", returns("guild-1")).with_guild(1))
        .button(DeclaredComponent::exact("vote", returns("anywhere")));
    let client = built(MockPlatform::ready("bot").with_guilds([1, 2]), registry, ClientOptions::default()).await;

    let results = batch(
        client
            .execute_component(click("vote", ComponentKind::Button, Some(2)))
            .await
            .unwrap(),
    );
    assert_eq!(outputs(&results), vec![serde_json::json!("anywhere")]);

    let results = batch(
        client
            .execute_component(click("vote", ComponentKind::Button, Some(1)))
            .await
            .unwrap(),
    );
    assert_eq!(results.len(), 2);
}

#[tokio::test]
async fn test_bot_filter_and_no_match() {
    let registry = Registry::new().button(DeclaredComponent::exact("vote", returns("x")).with_bot_id("other"));
    let client = built(MockPlatform::ready("bot"), registry, ClientOptions::default()).await;

    let out = client
        .execute_component(click("vote", ComponentKind::Button, None))
        .await
        .unwrap();
    assert_eq!(out.skip_reason(), Some(Skip::HandlerNotFound));
}

#[tokio::test]
async fn test_failing_handler_does_not_affect_siblings() {
    let registry = Registry::new()
        .button(DeclaredComponent::exact("go", handler(|_| async { Err::<serde_json::Value, _>(anyhow::anyhow!("broken")) })))
        .button(DeclaredComponent::exact("go", returns("fine")));
    let client = built(MockPlatform::ready("bot"), registry, ClientOptions::default()).await;

    let results = batch(
        client
            .execute_component(click("go", ComponentKind::Button, None))
            .await
            .unwrap(),
    );
    assert_eq!(results.len(), 2);
    assert!(matches!(results[0], Err(Error::Handler(_))));
    assert_eq!(outputs(&results), vec![serde_json::json!("fine")]);
}

#[tokio::test]
async fn test_select_menus_and_modals_use_their_own_tables() {
    let registry = Registry::new()
        .button(DeclaredComponent::exact("pick", returns("button")))
        .select_menu(DeclaredComponent::exact("pick", returns("menu")))
        .modal(DeclaredComponent::exact("pick", describe()));
    let client = built(MockPlatform::ready("bot"), registry, ClientOptions::default()).await;

    let results = batch(
        client
            .execute_component(click("pick", ComponentKind::RoleSelect, None))
            .await
            .unwrap(),
    );
    assert_eq!(outputs(&results), vec![serde_json::json!("menu")]);

    let submit = ModalSubmit {
        id: 1,
        token: "t".to_string(),
        custom_id: "pick".to_string(),
        guild_id: None,
        channel_id: 2,
        user: user(5),
        fields: Default::default(),
    };
    let results = batch(client.execute_modal(submit).await.unwrap());
    assert_eq!(outputs(&results), vec![serde_json::json!({"modal": "pick"})]);
}

#[tokio::test]
async fn test_reaction_matches_name_alias_and_custom_id() {
    let registry = Registry::new()
        .reaction(DeclaredReaction::new("👍", returns("thumbs")).with_alias("thumbsup").accept_partial())
        .reaction(DeclaredReaction::new("77", returns("custom")).accept_partial())
        .reaction(DeclaredReaction::new("party", returns("party-name")).accept_partial());
    let client = built(MockPlatform::ready("bot"), registry, ClientOptions::default()).await;

    let results = batch(
        client
            .execute_reaction(reaction(Emoji::unicode("👍"), Some(1), false), user(5).into())
            .await
            .unwrap(),
    );
    assert_eq!(outputs(&results), vec![serde_json::json!("thumbs")]);

    let results = batch(
        client
            .execute_reaction(reaction(Emoji::custom(77, "party"), Some(1), false), user(5).into())
            .await
            .unwrap(),
    );
    assert_eq!(
        outputs(&results),
        vec![serde_json::json!("custom"), serde_json::json!("party-name")]
    );

    let out = client
        .execute_reaction(reaction(Emoji::unicode("👎"), Some(1), false), user(5).into())
        .await
        .unwrap();
    assert_eq!(out.skip_reason(), Some(Skip::HandlerNotFound));
}

#[tokio::test]
async fn test_partial_reaction_and_user_are_fetched() {
    let platform = MockPlatform::ready("bot").with_user(user(5));
    let registry = Registry::new().reaction(DeclaredReaction::new("👍", describe()));
    let client = built(platform.clone(), registry, ClientOptions::default()).await;

    let results = batch(
        client
            .execute_reaction(reaction(Emoji::unicode("👍"), Some(1), true), ReactionUser::partial(5))
            .await
            .unwrap(),
    );
    assert_eq!(
        outputs(&results),
        vec![serde_json::json!({"reaction": "👍", "partial": false, "user_partial": false})]
    );
    assert_eq!(
        platform.calls(),
        vec![
            PlatformCall::FetchReaction { message_id: 700 },
            PlatformCall::FetchUser(5)
        ]
    );
}

#[tokio::test]
async fn test_partial_accepting_handler_skips_fetch() {
    let platform = MockPlatform::ready("bot");
    let registry = Registry::new().reaction(DeclaredReaction::new("👍", describe()).accept_partial());
    let client = built(platform.clone(), registry, ClientOptions::default()).await;

    let results = batch(
        client
            .execute_reaction(reaction(Emoji::unicode("👍"), Some(1), true), ReactionUser::partial(5))
            .await
            .unwrap(),
    );
    assert_eq!(
        outputs(&results),
        vec![serde_json::json!({"reaction": "👍", "partial": true, "user_partial": true})]
    );
    assert!(platform.calls().is_empty());
}

#[tokio::test]
async fn test_auto_remove_happens_before_handler() {
    let platform = MockPlatform::ready("bot");
    let observer = platform.clone();
    let registry = Registry::new().reaction(
        DeclaredReaction::new("🗑️", handler(move |_| {
            let observer = observer.clone();
            async move {
                let removed = observer
                    .calls()
                    .iter()
                    .any(|c| matches!(c, PlatformCall::RemoveReaction { user_id: 5, .. }));
                Ok(serde_json::json!(removed))
            }
        }))
        .remove_after(),
    );
    let client = built(platform.clone(), registry, ClientOptions::default()).await;

    let results = batch(
        client
            .execute_reaction(reaction(Emoji::unicode("🗑️"), Some(1), false), user(5).into())
            .await
            .unwrap(),
    );
    assert_eq!(outputs(&results), vec![serde_json::json!(true)]);
}

#[tokio::test]
async fn test_guild_only_reaction_ignores_direct_messages() {
    let registry = Registry::new().reaction(DeclaredReaction::new("👍", returns("x")).guild_only());
    let client = built(MockPlatform::ready("bot"), registry, ClientOptions::default()).await;

    let results = batch(
        client
            .execute_reaction(reaction(Emoji::unicode("👍"), None, false), user(5).into())
            .await
            .unwrap(),
    );
    assert!(results.is_empty());
}

#[test]
fn test_dispatch_executed_counts() {
    assert_eq!(Dispatch::Skipped(Skip::NotACommand).executed(), 0);
    assert_eq!(Dispatch::Handled(None).executed(), 1);
    assert_eq!(Dispatch::Batch(vec![Ok(None), Ok(None)]).executed(), 2);
}
