//! Guild scopes and their resolution to concrete guild ids.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;

use crate::error::{Error, Result};

/// Computes guild ids at sync or dispatch time.
#[async_trait]
pub trait GuildResolver: Send + Sync {
    /// `cached` holds the guilds the bot currently belongs to.
    async fn resolve(&self, cached: &[u64]) -> anyhow::Result<Vec<u64>>;
}

/// Where a declaration, or the whole bot, is registered and allowed to run.
#[derive(Clone)]
pub enum GuildScope {
    Id(u64),
    /// Every guild the bot is currently a member of.
    AllBotGuilds,
    Resolver(Arc<dyn GuildResolver>),
}

impl GuildScope {
    pub fn resolver(resolver: impl GuildResolver + 'static) -> Self {
        Self::Resolver(Arc::new(resolver))
    }

    /// The id when the scope is a single literal guild.
    pub fn as_id(&self) -> Option<u64> {
        match self {
            Self::Id(id) => Some(*id),
            _ => None,
        }
    }
}

impl From<u64> for GuildScope {
    fn from(id: u64) -> Self {
        Self::Id(id)
    }
}

impl fmt::Debug for GuildScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => f.debug_tuple("Id").field(id).finish(),
            Self::AllBotGuilds => f.write_str("AllBotGuilds"),
            Self::Resolver(_) => f.write_str("Resolver(..)"),
        }
    }
}

/// Resolve `scopes` into a deduplicated guild id set. Resolvers run
/// concurrently; the first failure fails the whole resolution.
pub async fn resolve_guilds<'a, I>(scopes: I, cached: &[u64]) -> Result<BTreeSet<u64>>
where
    I: IntoIterator<Item = &'a GuildScope>,
{
    let mut resolved = BTreeSet::new();
    let mut resolvers = Vec::new();

    for scope in scopes {
        match scope {
            GuildScope::Id(id) => {
                resolved.insert(*id);
            }
            GuildScope::AllBotGuilds => resolved.extend(cached.iter().copied()),
            GuildScope::Resolver(resolver) => resolvers.push(resolver.resolve(cached)),
        }
    }

    for ids in join_all(resolvers).await {
        resolved.extend(ids.map_err(Error::GuildResolution)?);
    }

    Ok(resolved)
}

/// Guild filter shared by every handler kind: events without a guild always
/// pass, an empty resolved set allows every guild, otherwise the guild must
/// be listed.
pub fn guild_allowed(resolved: &BTreeSet<u64>, guild_id: Option<u64>) -> bool {
    match guild_id {
        None => true,
        Some(_) if resolved.is_empty() => true,
        Some(id) => resolved.contains(&id),
    }
}
