//! Drains forwarded gateway events into the command client.

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod dispatcher_tests;

use std::sync::Arc;

use discord_commands::{CommandClient, Dispatch, Platform};
use discord_types::SyncOptions;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::handlers::GatewayEvent;
use crate::health::AppState;

pub struct Dispatcher<P: Platform> {
    client: Arc<CommandClient<P>>,
    state: AppState,
    sync: SyncOptions,
}

impl<P: Platform> Clone for Dispatcher<P> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            state: self.state.clone(),
            sync: self.sync,
        }
    }
}

impl<P: Platform + 'static> Dispatcher<P> {
    pub fn new(client: Arc<CommandClient<P>>, state: AppState, sync: SyncOptions) -> Self {
        Self { client, state, sync }
    }

    /// Runs until every sender is dropped. Lifecycle events are handled in
    /// order; everything else runs on its own task.
    pub async fn run(self, mut events: mpsc::UnboundedReceiver<GatewayEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                GatewayEvent::Ready { .. } | GatewayEvent::CacheReady => self.handle(event).await,
                event => {
                    let this = self.clone();
                    tokio::spawn(async move { this.handle(event).await });
                }
            }
        }
        debug!("Gateway event channel closed");
    }

    pub async fn handle(&self, event: GatewayEvent) {
        let outcome = match event {
            GatewayEvent::Ready { username } => {
                self.state.set_bot_username(username).await;
                return;
            }
            GatewayEvent::CacheReady => {
                self.sync_commands().await;
                return;
            }
            GatewayEvent::Interaction(interaction) => {
                ("interaction", self.client.execute_interaction(interaction).await)
            }
            GatewayEvent::Message(message) => ("message", self.client.execute_command(message, None).await),
            GatewayEvent::ReactionAdd { reaction, user } => {
                ("reaction", self.client.execute_reaction(reaction, user).await)
            }
            GatewayEvent::Raw { name, payload } => {
                let results = self.client.gateway().emit(name, payload).await;
                for err in results.into_iter().filter_map(|r| r.err()) {
                    warn!(event = name, "Event listener failed: {}", err);
                }
                return;
            }
        };

        match outcome {
            (kind, Ok(Dispatch::Skipped(reason))) => debug!(kind, ?reason, "Nothing to run"),
            (kind, Ok(Dispatch::Batch(results))) => {
                for err in results.iter().filter_map(|r| r.as_ref().err()) {
                    warn!(kind, "Handler failed: {}", err);
                }
            }
            (kind, Ok(_)) => debug!(kind, "Handled"),
            (kind, Err(e)) => warn!(kind, "Dispatch failed: {}", e),
        }
    }

    async fn sync_commands(&self) {
        match self.client.init_application_commands(self.sync).await {
            Ok(report) => {
                let summary = report.summary();
                if summary.scopes_failed > 0 {
                    warn!(
                        failed = summary.scopes_failed,
                        "Some command scopes failed to sync"
                    );
                } else {
                    info!(scopes = summary.scopes_synced, "Application commands synced");
                }
                self.state.record_sync(summary).await;
            }
            Err(e) => error!("Application command sync failed: {}", e),
        }
    }
}
