//! Application command engine for Discord bots
//!
//! Declarations are collected in a [`Registry`], handed to a
//! [`CommandClient`] together with a [`Platform`] implementation, and from
//! then on the client keeps the registered commands in sync with Discord
//! and routes inbound interactions, reactions, text messages and events to
//! their handlers.

pub mod client;
pub mod declarations;
pub mod diff;
pub mod dispatch;
pub mod emitter;
pub mod error;
pub mod guild;
pub mod handler;
#[cfg(any(test, feature = "test-support"))]
pub mod mock;
pub mod platform;
pub mod registry;
pub mod router;
pub mod sync;
pub mod text;

#[cfg(test)]
mod testing;

pub use client::{BuildState, ClientOptions, CommandClient, ListenerBinding, PluginState, DEFAULT_BOT_ID};
pub use declarations::{
    ComponentMatcher, DeclaredCommand, DeclaredComponent, DeclaredEvent, DeclaredOption,
    DeclaredReaction, DeclaredTextCommand, GroupDeclaration,
};
pub use diff::SyncScope;
pub use dispatch::{Dispatch, Skip};
pub use emitter::{EventEmitter, Listener, ListenerId, ListenerResults};
pub use error::{Error, Result};
pub use guild::{GuildResolver, GuildScope};
pub use handler::{autocomplete, handler, Guard, GuardRef, Handler, HandlerOutput, Invocation, Plugin};
pub use platform::Platform;
pub use registry::{Registry, TriggerEventData};
pub use sync::{SyncOutcome, SyncReport, SyncSummary};
pub use text::{
    ArgSplitter, NotFoundResponse, PrefixMatcher, PrefixResolver, ResolvePrefix, TextCommandConfig,
    TextCommandMessage, TextOptionDecl, TextOptionType, TextOptionValue,
};
