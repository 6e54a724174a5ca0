//! Provider registry: maps an agent id to a manifest of mutations, and
//! optionally a transcript dialect and a cached model-list resource. Thin
//! composition layer over the mutation engine, stream adapter and cached
//! resource -- this module is the only caller that assembles them into
//! something the CLI driver can execute.

pub mod claude;
pub mod codex;
pub mod kimi;
pub mod opencode;

use crate::acp::claude::ClaudeAdapter;
use crate::acp::codex::CodexAdapter;
use crate::acp::native::NativeAdapter;
use crate::acp::DialectAdapter;
use crate::cache::CachedResource;
use crate::mutation::Mutation;
use crate::vfs::Vfs;
use std::error::Error;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// The tool's own `cache.*` settings, resolved once and handed to every
/// provider's `CacheConfig` so `config/default.yaml`/a user's global
/// settings file actually govern the model-list cache instead of each
/// provider hardcoding its own TTLs. Defaults match `config/default.yaml`
/// for callers (mostly tests) that build a `ProviderContext` without going
/// through `settings::Settings`.
#[derive(Debug, Clone, Copy)]
pub struct CacheTtls {
    pub fetch_timeout: Duration,
    pub stale_ttl: Duration,
    pub fresh_ttl: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(3),
            stale_ttl: Duration::from_secs(7 * 24 * 3600),
            fresh_ttl: Duration::from_secs(3600),
        }
    }
}

/// Ambient inputs every provider needs to build its cached model-list
/// resource (cache directory depends on `$HOME`/`$XDG_CACHE_HOME`; the
/// resource needs a VFS to talk to disk through, same as the mutation
/// engine).
#[derive(Clone)]
pub struct ProviderContext {
    pub home_dir: PathBuf,
    pub fs: Arc<dyn Vfs>,
    pub cache_ttls: CacheTtls,
}

impl ProviderContext {
    pub fn new(home_dir: impl Into<PathBuf>, fs: Arc<dyn Vfs>) -> Self {
        Self { home_dir: home_dir.into(), fs, cache_ttls: CacheTtls::default() }
    }

    pub fn with_cache_ttls(mut self, cache_ttls: CacheTtls) -> Self {
        self.cache_ttls = cache_ttls;
        self
    }

    pub fn cache_dir(&self, app: &str) -> PathBuf {
        crate::cache::resolve_cache_dir(&self.home_dir, app)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Claude,
    Codex,
    Native,
}

impl Dialect {
    pub fn build_adapter(self) -> Box<dyn DialectAdapter> {
        match self {
            Dialect::Claude => Box::new(ClaudeAdapter::new()),
            Dialect::Codex => Box::new(CodexAdapter::new()),
            Dialect::Native => Box::new(NativeAdapter::new()),
        }
    }
}

pub struct ProviderManifest {
    pub id: &'static str,
    /// Agent's own binary/hidden-directory name, e.g. `"codex"` for
    /// `~/.codex` -- feeds the path mapper's dot-prefix collapse rule.
    pub agent_binary: &'static str,
    /// Relative to `$HOME`, the isolated subtree this provider's config is
    /// redirected into when `--isolated` is requested.
    pub isolated_base: &'static str,
    pub configure: Vec<Mutation>,
    pub unconfigure: Vec<Mutation>,
    pub dialect: Option<Dialect>,
    pub models: Option<CachedResource<Vec<String>>>,
}

impl std::fmt::Debug for ProviderManifest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderManifest")
            .field("id", &self.id)
            .field("agent_binary", &self.agent_binary)
            .field("isolated_base", &self.isolated_base)
            .field("dialect", &self.dialect)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub enum RegistryError {
    UnsupportedAgent(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::UnsupportedAgent(name) => write!(f, "unsupported agent: {}", name),
        }
    }
}

impl Error for RegistryError {}

pub mod registry {
    use super::*;

    pub fn lookup(name: &str, ctx: &ProviderContext) -> Result<ProviderManifest, RegistryError> {
        match name {
            "claude" => Ok(claude::manifest(ctx)),
            "codex" => Ok(codex::manifest(ctx)),
            "opencode" => Ok(opencode::manifest(ctx)),
            "kimi" => Ok(kimi::manifest(ctx)),
            other => Err(RegistryError::UnsupportedAgent(other.to_string())),
        }
    }

    pub fn known_agents() -> &'static [&'static str] {
        &["claude", "codex", "opencode", "kimi"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::MemFs;

    fn ctx() -> ProviderContext {
        ProviderContext::new("/home/user", Arc::new(MemFs::new()))
    }

    #[test]
    fn lookup_resolves_every_known_agent() {
        let ctx = ctx();
        for name in registry::known_agents() {
            assert!(registry::lookup(name, &ctx).is_ok(), "expected {name} to resolve");
        }
    }

    #[test]
    fn lookup_rejects_unknown_agent_name() {
        let err = registry::lookup("not-a-real-agent", &ctx()).unwrap_err();
        assert!(matches!(err, RegistryError::UnsupportedAgent(name) if name == "not-a-real-agent"));
    }
}
