use discord_types::{CommandDefinition, DisableOptions, InitCommandOptions, OptionType, SyncOptions};

use super::*;
use crate::client::ClientOptions;
use crate::declarations::DeclaredOption;
use crate::guild::GuildScope;
use crate::mock::{MockPlatform, PlatformCall};
use crate::registry::Registry;
use crate::testing::{built, returns};

fn echo() -> DeclaredCommand {
    DeclaredCommand::slash("echo", "Echo back")
        .with_option(DeclaredOption::new(OptionType::String, "text", "Text").required())
        .with_handler(returns("echo"))
}

fn no_delete() -> InitCommandOptions {
    InitCommandOptions {
        disable: DisableOptions {
            delete: true,
            ..DisableOptions::default()
        },
    }
}

fn set_guild_names(call: &PlatformCall) -> (u64, Vec<String>) {
    match call {
        PlatformCall::SetGuild(id, defs) => (*id, defs.iter().map(|d| d.name.clone()).collect()),
        other => panic!("expected a guild bulk replace, got {:?}", other),
    }
}

#[tokio::test]
async fn test_guild_sync_issues_one_bulk_replace() {
    let platform = MockPlatform::ready("tester").with_guilds([1]);
    platform.register_guild(1, echo().to_definition());
    platform.register_guild(1, CommandDefinition::chat_input("stale", "Old"));
    let registry = Registry::new()
        .command(echo().with_guild(1))
        .command(DeclaredCommand::slash("fresh", "New").with_guild(1).with_handler(returns("fresh")));
    let client = built(platform.clone(), registry, ClientOptions::default()).await;

    let commands = client.registry().index().application_commands.clone();
    let outcome = client
        .init_guild_application_commands(1, &commands, InitCommandOptions::default())
        .await
        .unwrap();

    assert_eq!(outcome.skipped, vec!["echo"]);
    assert_eq!(outcome.added, vec!["fresh"]);
    assert_eq!(outcome.deleted, vec!["stale"]);
    assert!(outcome.applied);

    let calls = platform.set_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(set_guild_names(&calls[0]), (1, vec!["echo".to_string(), "fresh".to_string()]));
}

#[tokio::test]
async fn test_second_sync_is_a_no_op() {
    let platform = MockPlatform::ready("tester").with_guilds([1]);
    let registry = Registry::new().command(echo().with_guild(1));
    let client = built(platform.clone(), registry, ClientOptions::default()).await;

    let first = client.init_application_commands(SyncOptions::default()).await.unwrap();
    assert!(first.guilds[&1].as_ref().unwrap().applied);
    assert_eq!(platform.set_calls().len(), 1);

    let second = client.init_application_commands(SyncOptions::default()).await.unwrap();
    let outcome = second.guilds[&1].as_ref().unwrap();
    assert!(!outcome.applied);
    assert_eq!(outcome.skipped, vec!["echo"]);
    assert_eq!(platform.set_calls().len(), 1);
}

#[tokio::test]
async fn test_disabled_delete_keeps_registered_command() {
    let platform = MockPlatform::ready("tester").with_guilds([1]);
    platform.register_guild(1, CommandDefinition::chat_input("manual", "Registered by hand"));
    let registry = Registry::new().command(echo().with_guild(1));
    let client = built(platform.clone(), registry, ClientOptions::default()).await;

    let commands = client.registry().index().application_commands.clone();
    let outcome = client
        .init_guild_application_commands(1, &commands, no_delete())
        .await
        .unwrap();

    assert_eq!(outcome.deleted, vec!["manual"]);
    let calls = platform.set_calls();
    assert_eq!(
        set_guild_names(&calls[0]),
        (1, vec!["echo".to_string(), "manual".to_string()])
    );
}

#[tokio::test]
async fn test_guild_dropped_from_scope_is_deleted_there() {
    let platform = MockPlatform::ready("tester").with_guilds([1, 2]);
    platform.register_guild(1, echo().to_definition());
    let registry = Registry::new().command(echo().with_guild(2));
    let client = built(platform.clone(), registry, ClientOptions::default()).await;

    let commands = client.registry().index().application_commands.clone();
    let outcome = client
        .init_guild_application_commands(1, &commands, InitCommandOptions::default())
        .await
        .unwrap();

    assert_eq!(outcome.deleted, vec!["echo"]);
    assert!(outcome.added.is_empty());
    assert_eq!(set_guild_names(&platform.set_calls()[0]), (1, Vec::new()));
}

#[tokio::test]
async fn test_command_in_two_guilds_syncs_both() {
    let platform = MockPlatform::ready("tester").with_guilds([1, 2]);
    let registry = Registry::new().command(echo().with_guild(1).with_guild(2));
    let client = built(platform.clone(), registry, ClientOptions::default()).await;

    let by_guild = client.commands_by_guild().await.unwrap();
    assert_eq!(by_guild.keys().copied().collect::<Vec<_>>(), vec![1, 2]);

    let report = client.init_application_commands(SyncOptions::default()).await.unwrap();
    assert!(report.guilds.values().all(|r| r.as_ref().unwrap().applied));
    assert_eq!(platform.guild_commands(1).len(), 1);
    assert_eq!(platform.guild_commands(2).len(), 1);
    // nothing global was declared or registered
    assert!(!report.global.as_ref().unwrap().applied);
}

#[tokio::test]
async fn test_bot_guilds_are_unioned_with_declared_guilds() {
    let platform = MockPlatform::ready("tester").with_guilds([1, 2, 3]);
    let registry = Registry::new().command(echo().with_guild(2));
    let options = ClientOptions {
        bot_guilds: vec![GuildScope::Id(1)],
        ..ClientOptions::default()
    };
    let client = built(platform, registry, options).await;

    let by_guild = client.commands_by_guild().await.unwrap();
    assert_eq!(by_guild.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
}

#[tokio::test]
async fn test_all_bot_guilds_scope_covers_cache() {
    let platform = MockPlatform::ready("tester").with_guilds([4, 5]);
    let registry = Registry::new().command(echo());
    let options = ClientOptions {
        bot_guilds: vec![GuildScope::AllBotGuilds],
        ..ClientOptions::default()
    };
    let client = built(platform, registry, options).await;

    let by_guild = client.commands_by_guild().await.unwrap();
    assert_eq!(by_guild.keys().copied().collect::<Vec<_>>(), vec![4, 5]);
}

#[tokio::test]
async fn test_unavailable_and_failing_guilds_are_isolated() {
    let platform = MockPlatform::ready("tester").with_guilds([1, 2]);
    platform.fail_guild(2);
    let registry = Registry::new().command(echo().with_guild(1).with_guild(2).with_guild(3));
    let client = built(platform.clone(), registry, ClientOptions::default()).await;

    let report = client.init_application_commands(SyncOptions::default()).await.unwrap();

    assert!(report.guilds[&1].as_ref().unwrap().applied);
    assert!(matches!(report.guilds[&2], Err(Error::Platform(_))));
    assert!(matches!(report.guilds[&3], Err(Error::GuildUnavailable(3))));
    assert_eq!(report.unavailable_guilds(), vec![3]);

    let summary = report.summary();
    assert_eq!(summary.scopes_synced, 2);
    assert_eq!(summary.scopes_failed, 1);
    assert_eq!(summary.guilds_unavailable, vec![3]);
    assert_eq!(platform.guild_commands(1).len(), 1);
}

#[tokio::test]
async fn test_bot_id_filter_excludes_other_bots_commands() {
    let platform = MockPlatform::ready("tester").with_guilds([1]);
    let registry = Registry::new()
        .command(echo().with_guild(1).with_bot_id("other"))
        .command(DeclaredCommand::slash("mine", "Mine").with_handler(returns("mine")));
    let options = ClientOptions {
        bot_id: "me".to_string(),
        ..ClientOptions::default()
    };
    let client = built(platform.clone(), registry, options).await;

    let report = client.init_application_commands(SyncOptions::default()).await.unwrap();
    assert!(report.guilds.is_empty());
    assert_eq!(report.global.as_ref().unwrap().added, vec!["mine"]);
    assert_eq!(platform.global_commands()[0].name(), "mine");
}

#[tokio::test]
async fn test_global_sync_requires_application_context() {
    let platform = MockPlatform::new();
    let registry = Registry::new().command(echo());
    let client = built(platform.clone(), registry, ClientOptions::default()).await;

    let err = client
        .init_global_application_commands(InitCommandOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotReady));
    assert!(platform.set_calls().is_empty());
}

#[tokio::test]
async fn test_global_sync_ignores_guild_scoped_declarations() {
    let platform = MockPlatform::ready("tester").with_guilds([1]);
    platform.register_global(CommandDefinition::chat_input("old", "Old global"));
    let registry = Registry::new()
        .command(echo())
        .command(DeclaredCommand::slash("local", "Guild only").with_guild(1).with_handler(returns("l")));
    let client = built(platform.clone(), registry, ClientOptions::default()).await;

    let outcome = client
        .init_global_application_commands(InitCommandOptions::default())
        .await
        .unwrap();
    assert_eq!(outcome.added, vec!["echo"]);
    assert_eq!(outcome.deleted, vec!["old"]);
    assert_eq!(platform.set_calls(), vec![PlatformCall::SetGlobal(vec![echo().to_definition()])]);
}

#[tokio::test]
async fn test_clear_application_commands() {
    let platform = MockPlatform::ready("tester").with_guilds([1]);
    platform.register_guild(1, echo().to_definition());
    platform.register_global(echo().to_definition());
    let client = built(platform.clone(), Registry::new(), ClientOptions::default()).await;

    client.clear_application_commands(&[1, 9]).await.unwrap();
    assert!(platform.guild_commands(1).is_empty());
    assert_eq!(platform.set_calls(), vec![PlatformCall::SetGuild(1, Vec::new())]);

    client.clear_application_commands(&[]).await.unwrap();
    assert!(platform.global_commands().is_empty());
}

#[tokio::test]
async fn test_clear_global_requires_application_context() {
    let client = built(MockPlatform::new(), Registry::new(), ClientOptions::default()).await;
    assert!(matches!(
        client.clear_application_commands(&[]).await,
        Err(Error::NotReady)
    ));
}

#[tokio::test]
async fn test_guild_scoped_command_resolving_to_no_guild_stays_off_global() {
    let platform = MockPlatform::ready("tester");
    let registry = Registry::new()
        .command(echo())
        .command(
            DeclaredCommand::slash("admin", "Admin only")
                .with_guild(GuildScope::AllBotGuilds)
                .with_handler(returns("admin")),
        );
    let client = built(platform.clone(), registry, ClientOptions::default()).await;

    let report = client.init_application_commands(SyncOptions::default()).await.unwrap();
    assert!(report.guilds.is_empty());
    assert_eq!(report.global.as_ref().unwrap().added, vec!["echo"]);

    let names: Vec<String> = platform.global_commands().iter().map(|c| c.name().to_string()).collect();
    assert_eq!(names, vec!["echo"]);
}

#[tokio::test]
async fn test_client_guild_scope_keeps_commands_off_global() {
    let platform = MockPlatform::ready("tester");
    let options = ClientOptions {
        bot_guilds: vec![GuildScope::AllBotGuilds],
        ..ClientOptions::default()
    };
    let client = built(platform.clone(), Registry::new().command(echo()), options).await;

    let report = client.init_application_commands(SyncOptions::default()).await.unwrap();
    assert!(report.global.as_ref().unwrap().added.is_empty());
    assert!(platform.global_commands().is_empty());
}

#[tokio::test]
async fn test_verbose_no_op_sync_still_reports_diff() {
    let platform = MockPlatform::ready("tester");
    let options = ClientOptions {
        silent: false,
        ..ClientOptions::default()
    };
    let client = built(platform.clone(), Registry::new().command(echo()), options).await;

    client
        .init_global_application_commands(InitCommandOptions::default())
        .await
        .unwrap();
    let second = client
        .init_global_application_commands(InitCommandOptions::default())
        .await
        .unwrap();

    assert!(!second.applied);
    assert_eq!(second.diff.len(), 4);
    assert!(second.diff.iter().any(|l| l.ends_with("skipping 1 [echo]")));
    assert!(second.diff.iter().any(|l| l.ends_with("adding 0 []")));
    assert_eq!(platform.set_calls().len(), 1);
}

#[tokio::test]
async fn test_silent_sync_reports_no_diff() {
    let platform = MockPlatform::ready("tester");
    let client = built(platform.clone(), Registry::new().command(echo()), ClientOptions::default()).await;

    let outcome = client
        .init_global_application_commands(InitCommandOptions::default())
        .await
        .unwrap();
    assert!(outcome.applied);
    assert!(outcome.diff.is_empty());
}
