//! Thin CLI driver: looks up a provider manifest, builds a `MutationContext`,
//! calls `run_mutations`, and prints outcomes. No credential handling, no
//! interactive prompts, no color rendering.

use crate::cli::{AgentArgs, CacheAction, CacheArgs, CacheResource, Cli, Command};
use crate::mutation::{run_mutations, Detail, Effect, MutationContext, MutationError, Options};
use crate::path_mapper::PathMapper;
use crate::providers::{self, CacheTtls, ProviderContext, ProviderManifest, RegistryError};
use crate::settings::{Settings, SettingsError};
use crate::vfs::{StdFs, Vfs};
use std::error::Error;
use std::fmt;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

pub struct Deps {
    pub fs: Arc<dyn Vfs>,
    pub home_dir: PathBuf,
}

impl Deps {
    pub fn real() -> Self {
        let home_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self { fs: Arc::new(StdFs), home_dir }
    }
}

pub async fn run(cli: Cli, deps: &Deps) -> Result<(), AppError> {
    dispatch(cli.command, deps).await
}

pub fn exit_code_for(result: Result<(), AppError>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(command: Command, deps: &Deps) -> Result<(), AppError> {
    match command {
        Command::Configure(args) => cmd_configure(args, deps).await,
        Command::Unconfigure(args) => cmd_unconfigure(args, deps).await,
        Command::Cache(args) => cmd_cache(args, deps).await,
    }
}

#[derive(Debug)]
pub enum AppError {
    Registry(RegistryError),
    Mutation(MutationError),
    Settings(SettingsError),
    Message(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Registry(source) => write!(f, "{}", source),
            AppError::Mutation(source) => write!(f, "{}", source),
            AppError::Settings(source) => write!(f, "{}", source),
            AppError::Message(message) => write!(f, "{}", message),
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AppError::Registry(source) => Some(source),
            AppError::Mutation(source) => Some(source),
            AppError::Settings(source) => Some(source),
            AppError::Message(_) => None,
        }
    }
}

impl From<RegistryError> for AppError {
    fn from(value: RegistryError) -> Self {
        AppError::Registry(value)
    }
}

impl From<MutationError> for AppError {
    fn from(value: MutationError) -> Self {
        AppError::Mutation(value)
    }
}

impl From<SettingsError> for AppError {
    fn from(value: SettingsError) -> Self {
        AppError::Settings(value)
    }
}

/// Builds the provider context with the tool's own `cache.*` settings
/// applied, so `config/default.yaml`/a global override actually governs
/// every provider's model-list cache. Falls back to `CacheTtls::default()`
/// if settings fail to load -- a malformed global settings file shouldn't
/// block `configure`/`cache` from running against the packaged defaults.
fn provider_context(deps: &Deps) -> ProviderContext {
    let ctx = ProviderContext::new(deps.home_dir.clone(), deps.fs.clone());
    match Settings::load() {
        Ok(settings) => ctx.with_cache_ttls(CacheTtls {
            fetch_timeout: settings.fetch_timeout(),
            stale_ttl: settings.stale_ttl(),
            fresh_ttl: settings.fresh_ttl(),
        }),
        Err(_) => ctx,
    }
}

fn mutation_context(
    args: &AgentArgs,
    deps: &Deps,
    manifest: &ProviderManifest,
) -> Result<MutationContext, AppError> {
    let mut ctx = MutationContext::new(deps.fs.clone(), deps.home_dir.clone()).dry_run(args.dry_run);
    if args.isolated {
        let settings = Settings::load()?;
        let isolated_base = deps
            .home_dir
            .join(settings.isolated_base_root())
            .join(manifest.agent_binary);
        ctx = ctx.with_path_mapper(Arc::new(PathMapper::new(
            deps.home_dir.clone(),
            isolated_base,
            manifest.agent_binary,
        )));
    }
    Ok(ctx)
}

async fn cmd_configure(args: AgentArgs, deps: &Deps) -> Result<(), AppError> {
    let provider_ctx = provider_context(deps);
    let manifest = providers::registry::lookup(&args.agent, &provider_ctx)?;
    let mutation_ctx = mutation_context(&args, deps, &manifest)?;
    let outcome = run_mutations(&manifest.configure, &mutation_ctx, &Options::new()).await?;
    print_outcome("configure", &args.agent, args.dry_run, outcome.changed, &outcome.effects.iter().map(|e| (e.effect, e.detail)).collect::<Vec<_>>());
    Ok(())
}

async fn cmd_unconfigure(args: AgentArgs, deps: &Deps) -> Result<(), AppError> {
    let provider_ctx = provider_context(deps);
    let manifest = providers::registry::lookup(&args.agent, &provider_ctx)?;
    let mutation_ctx = mutation_context(&args, deps, &manifest)?;
    let outcome = run_mutations(&manifest.unconfigure, &mutation_ctx, &Options::new()).await?;
    print_outcome("unconfigure", &args.agent, args.dry_run, outcome.changed, &outcome.effects.iter().map(|e| (e.effect, e.detail)).collect::<Vec<_>>());
    Ok(())
}

fn print_outcome(verb: &str, agent: &str, dry_run: bool, changed: bool, effects: &[(Effect, Detail)]) {
    let mode = if dry_run { " (dry run)" } else { "" };
    println!("{verb} {agent}{mode}: changed={changed}");
    for (effect, detail) in effects {
        println!("  {effect:?} {detail:?}");
    }
}

async fn cmd_cache(args: CacheArgs, deps: &Deps) -> Result<(), AppError> {
    let provider_ctx = provider_context(deps);
    let manifest = providers::registry::lookup(&args.agent, &provider_ctx)?;
    let Some(models) = manifest.models else {
        return Err(AppError::Message(format!("{} has no cached model list", args.agent)));
    };
    let CacheResource::Models { action } = args.resource;
    match action {
        CacheAction::Refresh => {
            let entry = models.refresh().await;
            println!("refreshed {} model(s), bundled_fallback={}", entry.data.len(), entry.is_bundled_fallback());
        }
        CacheAction::Clear => {
            models.clear().await;
            println!("cleared cached models for {}", args.agent);
        }
        CacheAction::Stats => {
            let stats = models.stats();
            println!(
                "memory_cache_size={} memory_cache_max={} cache_dir={}",
                stats.memory_cache_size,
                stats.memory_cache_max,
                stats.cache_dir.display()
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{CacheResource, Command};
    use crate::vfs::MemFs;

    fn deps() -> Deps {
        Deps { fs: Arc::new(MemFs::new().with_dir("/home/user")), home_dir: PathBuf::from("/home/user") }
    }

    #[tokio::test]
    async fn configure_then_unconfigure_round_trips_through_dispatch() {
        let deps = deps();
        dispatch(
            Command::Configure(AgentArgs { agent: "claude".into(), dry_run: false, isolated: false }),
            &deps,
        )
        .await
        .unwrap();
        let text = deps.fs.read_file(&deps.home_dir.join(".claude.json")).await.unwrap();
        assert!(text.contains("api.poe.com"));

        dispatch(
            Command::Unconfigure(AgentArgs { agent: "claude".into(), dry_run: false, isolated: false }),
            &deps,
        )
        .await
        .unwrap();
        let text = deps.fs.read_file(&deps.home_dir.join(".claude.json")).await.unwrap();
        assert!(!text.contains("api.poe.com"));
    }

    #[tokio::test]
    async fn configure_with_dry_run_writes_nothing() {
        let deps = deps();
        dispatch(
            Command::Configure(AgentArgs { agent: "codex".into(), dry_run: true, isolated: false }),
            &deps,
        )
        .await
        .unwrap();
        assert!(deps.fs.read_file(&deps.home_dir.join(".codex/config.toml")).await.is_err());
    }

    #[tokio::test]
    async fn configure_with_isolated_redirects_under_the_isolated_base() {
        let deps = deps();
        dispatch(
            Command::Configure(AgentArgs { agent: "codex".into(), dry_run: false, isolated: true }),
            &deps,
        )
        .await
        .unwrap();
        assert!(deps.fs.read_file(&deps.home_dir.join(".codex/config.toml")).await.is_err());
        let text = deps
            .fs
            .read_file(&deps.home_dir.join(".poe-code/codex/config.toml"))
            .await
            .unwrap();
        assert!(text.contains("api.poe.com"));
    }

    #[tokio::test]
    async fn configure_rejects_unknown_agent() {
        let deps = deps();
        let err = dispatch(
            Command::Configure(AgentArgs { agent: "nope".into(), dry_run: false, isolated: false }),
            &deps,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Registry(_)));
    }

    #[tokio::test]
    async fn cache_stats_reports_configured_capacity() {
        let deps = deps();
        dispatch(
            Command::Cache(CacheArgs {
                agent: "claude".into(),
                resource: CacheResource::Models { action: CacheAction::Stats },
            }),
            &deps,
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn cache_on_agent_with_empty_bundled_model_list_still_succeeds() {
        let deps = deps();
        let result = dispatch(
            Command::Cache(CacheArgs {
                agent: "opencode".into(),
                resource: CacheResource::Models { action: CacheAction::Clear },
            }),
            &deps,
        )
        .await;
        assert!(result.is_ok());
    }

    #[test]
    fn provider_context_threads_global_settings_into_cache_ttls() {
        let _guard = crate::test_support::env_lock();
        let settings_dir = tempfile::tempdir().unwrap();
        let settings_path = settings_dir.path().join("settings.yaml");
        std::fs::write(&settings_path, "cache:\n  fetch_timeout_secs: 9\n  stale_ttl_secs: 1000\n  fresh_ttl_secs: 100\n").unwrap();
        unsafe {
            std::env::set_var("POE_CODE_GLOBAL_SETTINGS", &settings_path);
        }

        let ctx = provider_context(&deps());
        unsafe {
            std::env::remove_var("POE_CODE_GLOBAL_SETTINGS");
        }

        assert_eq!(ctx.cache_ttls.fetch_timeout, std::time::Duration::from_secs(9));
        assert_eq!(ctx.cache_ttls.stale_ttl, std::time::Duration::from_secs(1000));
        assert_eq!(ctx.cache_ttls.fresh_ttl, std::time::Duration::from_secs(100));
    }
}
