//! The command client: owns the platform handle, the declaration registry
//! and the event bindings, and drives the build and login lifecycle.

#[cfg(test)]
#[path = "client_tests.rs"]
mod client_tests;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use futures::future::join_all;
use tracing::{debug, error, info};

use crate::declarations::DeclaredOption;
use crate::emitter::{EventEmitter, Listener, ListenerId, ListenerResults};
use crate::error::{Error, Result};
use crate::guild::{guild_allowed, resolve_guilds, GuildScope};
use crate::handler::{GuardRef, Plugin};
use crate::platform::Platform;
use crate::registry::{Registry, TriggerEventData};
use crate::text::{PrefixMatcher, TextCommandConfig};

pub const DEFAULT_BOT_ID: &str = "bot";

/// Client-wide settings
#[derive(Clone)]
pub struct ClientOptions {
    /// Identity matched against declarations' bot id lists
    pub bot_id: String,
    /// Suppresses sync diffs, not-found warnings and the debug dump
    pub silent: bool,
    /// Guild scopes applied to every declaration in addition to its own
    pub bot_guilds: Vec<GuildScope>,
    /// Guards run before every declaration's own guards
    pub guards: Vec<GuardRef>,
    pub plugins: Vec<Arc<dyn Plugin>>,
    pub text: TextCommandConfig,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            bot_id: DEFAULT_BOT_ID.to_string(),
            silent: true,
            bot_guilds: Vec::new(),
            guards: Vec::new(),
            plugins: Vec::new(),
            text: TextCommandConfig::default(),
        }
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("bot_id", &self.bot_id)
            .field("silent", &self.silent)
            .field("bot_guilds", &self.bot_guilds)
            .field("guards", &self.guards.len())
            .field("plugins", &self.plugins.iter().map(|p| p.name()).collect::<Vec<_>>())
            .field("text", &self.text)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    NotBuilt,
    Building,
    Built,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    NotLoaded,
    Loaded,
}

#[derive(Debug)]
struct Lifecycle {
    build: BuildState,
    plugins: PluginState,
}

/// One attached event listener
#[derive(Clone)]
pub struct ListenerBinding {
    pub event: String,
    pub once: bool,
    pub rest: bool,
    pub id: ListenerId,
    pub trigger: Listener,
}

impl fmt::Debug for ListenerBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerBinding")
            .field("event", &self.event)
            .field("once", &self.once)
            .field("rest", &self.rest)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

pub struct CommandClient<P: Platform> {
    pub(crate) platform: Arc<P>,
    pub(crate) registry: Registry,
    pub(crate) options: ClientOptions,
    lifecycle: Mutex<Lifecycle>,
    bindings: Mutex<HashMap<String, Vec<ListenerBinding>>>,
    gateway: EventEmitter,
    rest: EventEmitter,
    pub(crate) prefix_matcher: OnceLock<Arc<PrefixMatcher>>,
}

impl<P: Platform> CommandClient<P> {
    pub fn new(platform: P, registry: Registry, options: ClientOptions) -> Self {
        Self::with_shared_platform(Arc::new(platform), registry, options)
    }

    pub fn with_shared_platform(platform: Arc<P>, registry: Registry, options: ClientOptions) -> Self {
        Self {
            platform,
            registry,
            options,
            lifecycle: Mutex::new(Lifecycle {
                build: BuildState::NotBuilt,
                plugins: PluginState::NotLoaded,
            }),
            bindings: Mutex::new(HashMap::new()),
            gateway: EventEmitter::new(),
            rest: EventEmitter::new(),
            prefix_matcher: OnceLock::new(),
        }
    }

    pub fn platform(&self) -> &Arc<P> {
        &self.platform
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn bot_id(&self) -> &str {
        &self.options.bot_id
    }

    pub fn silent(&self) -> bool {
        self.options.silent
    }

    /// Emitter for gateway events
    pub fn gateway(&self) -> &EventEmitter {
        &self.gateway
    }

    /// Emitter for REST-layer events
    pub fn rest(&self) -> &EventEmitter {
        &self.rest
    }

    pub fn build_state(&self) -> BuildState {
        self.lifecycle().build
    }

    pub fn plugin_state(&self) -> PluginState {
        self.lifecycle().plugins
    }

    pub fn is_built(&self) -> bool {
        self.build_state() == BuildState::Built
    }

    /// Bot username when logged in, otherwise the configured bot id.
    pub(crate) fn display_name(&self) -> String {
        self.platform
            .bot_username()
            .unwrap_or_else(|| self.options.bot_id.clone())
    }

    /// Guild filter over the client-level scopes plus `scopes`.
    pub(crate) async fn guild_allowed(&self, scopes: &[GuildScope], guild_id: Option<u64>) -> Result<bool> {
        if guild_id.is_none() {
            return Ok(true);
        }
        let resolved = resolve_guilds(
            self.options.bot_guilds.iter().chain(scopes),
            &self.platform.cached_guild_ids(),
        )
        .await?;
        Ok(guild_allowed(&resolved, guild_id))
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn binding_store(&self) -> MutexGuard<'_, HashMap<String, Vec<ListenerBinding>>> {
        self.bindings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Initialize every plugin concurrently. Runs at most once.
    pub async fn init_plugins(&self) -> Result<()> {
        {
            let mut lifecycle = self.lifecycle();
            if lifecycle.plugins == PluginState::Loaded {
                return Ok(());
            }
            lifecycle.plugins = PluginState::Loaded;
        }

        let results = join_all(self.options.plugins.iter().map(|plugin| async move {
            plugin.init().await.map_err(|error| Error::Plugin {
                name: plugin.name().to_string(),
                error,
            })
        }))
        .await;

        for plugin in &self.options.plugins {
            debug!(plugin = plugin.name(), "Plugin initialized");
        }
        results.into_iter().collect()
    }

    /// Load plugins, build the registry and bind declared events. Repeat
    /// calls are no-ops; a failed build can be retried.
    pub async fn build(&self) -> Result<()> {
        {
            let mut lifecycle = self.lifecycle();
            if lifecycle.build != BuildState::NotBuilt {
                return Ok(());
            }
            lifecycle.build = BuildState::Building;
        }

        let built = async {
            self.init_plugins().await?;
            self.registry.build()?;
            self.bind_events();
            Ok::<_, Error>(())
        }
        .await;

        self.lifecycle().build = match built {
            Ok(()) => BuildState::Built,
            Err(_) => BuildState::NotBuilt,
        };
        built?;

        if !self.options.silent {
            self.print_debug();
        }
        Ok(())
    }

    fn bind_events(&self) {
        let mut store = self.binding_store();
        for key in &self.registry.index().used_events {
            let trigger = self.registry.trigger(TriggerEventData {
                event: key.event.clone(),
                once: key.once,
                rest: key.rest,
                guards: self.options.guards.clone(),
            });
            let emitter = if key.rest { &self.rest } else { &self.gateway };
            let id = if key.once {
                emitter.once(&key.event, trigger.clone())
            } else {
                emitter.on(&key.event, trigger.clone())
            };
            store.entry(key.event.clone()).or_default().push(ListenerBinding {
                event: key.event.clone(),
                once: key.once,
                rest: key.rest,
                id,
                trigger,
            });
        }
    }

    /// Detach every binding created by [`build`](Self::build) and clear the
    /// store. Bindings already gone (e.g. fired `once` listeners) are
    /// skipped.
    pub fn unbind(&self) {
        let mut store = self.binding_store();
        for binding in store.values().flatten() {
            let emitter = if binding.rest { &self.rest } else { &self.gateway };
            emitter.off(&binding.event, binding.id);
        }
        store.clear();
    }

    /// Snapshot of the current bindings.
    pub fn bindings(&self) -> Vec<ListenerBinding> {
        self.binding_store().values().flatten().cloned().collect()
    }

    /// Build, then open the platform session.
    pub async fn login(&self, token: &str) -> Result<()> {
        self.build().await?;
        if !self.options.silent {
            info!("{} >> connecting discord...", self.options.bot_id);
        }
        self.platform.login(token).await
    }

    /// Run the handlers declared for `data` directly, without an emitter.
    pub async fn trigger(&self, data: TriggerEventData, payload: serde_json::Value) -> ListenerResults {
        self.registry.trigger(data)(payload).await
    }

    /// Log everything the registry holds.
    pub fn print_debug(&self) {
        if !self.registry.is_built() {
            error!("Build the client before calling this method");
            return;
        }
        let index = self.registry.index();
        let name = self.display_name();

        info!("{} >> Events", name);
        if index.events.is_empty() {
            info!("    No events detected");
        }
        for event in &index.events {
            info!(
                "    >> {} ({}){}",
                event.event,
                event.label,
                if event.once { " [once]" } else { "" }
            );
        }

        for (title, table) in [
            ("Buttons", &index.buttons),
            ("Select menus", &index.select_menus),
            ("Modals", &index.modals),
        ] {
            info!("{} >> {}", name, title);
            if table.is_empty() {
                info!("    No {} detected", title.to_lowercase());
            }
            for component in table {
                info!("    >> {} ({})", component.matcher, component.label);
            }
        }

        info!("{} >> Reactions", name);
        if index.reactions.is_empty() {
            info!("    No reactions detected");
        }
        for reaction in &index.reactions {
            info!("    >> {} [{}] ({})", reaction.emoji, reaction.aliases.join(", "), reaction.label);
        }

        for (title, table) in [
            ("Context menu: user", &index.user_commands),
            ("Context menu: message", &index.message_commands),
        ] {
            info!("{} >> {}", name, title);
            if table.is_empty() {
                info!("    No context menu detected");
            }
            for command in table {
                info!("    >> {} ({})", command.name(), command.label);
            }
        }

        info!("{} >> Application commands", name);
        if index.application_commands.is_empty() {
            info!("    No application commands detected");
        }
        for command in &index.application_commands {
            info!("    >> {} [{}] ({})", command.name(), command.kind(), command.label);
            print_options(&command.options, 2);
        }

        info!("{} >> Simple commands", name);
        if index.text_commands.is_empty() {
            info!("    No simple commands detected");
        }
        for command in &index.text_commands {
            info!("    >> {} ({})", command.name, command.label);
            if !command.aliases.is_empty() {
                info!("        aliases: {}", command.aliases.join(", "));
            }
            for option in &command.options {
                info!("        {}: {:?}", option.name, option.kind);
            }
        }
    }
}

fn print_options(options: &[DeclaredOption], depth: usize) {
    let indent = "    ".repeat(depth);
    for option in options {
        info!("{}{}: {}", indent, option.name(), option.kind());
        print_options(&option.options, depth + 1);
    }
}
