//! Codex CLI provider: adds a `model_providers.poe` table to
//! `~/.codex/config.toml` and points the active `model_provider` at it.

use super::{Dialect, ProviderContext, ProviderManifest};
use crate::cache::{CacheConfig, CachedResource};
use crate::mutation::builders::config_mutation;
use crate::mutation::ConfigFormat;
use serde_json::json;

const POE_BASE_URL: &str = "https://api.poe.com/openai/v1";

pub fn manifest(ctx: &ProviderContext) -> ProviderManifest {
    let configure = vec![config_mutation::merge(
        "~/.codex/config.toml",
        ConfigFormat::Toml,
        json!({
            "model_provider": "poe",
            "model_providers": {
                "poe": {
                    "name": "Poe",
                    "base_url": POE_BASE_URL,
                    "env_key": "POE_API_KEY",
                }
            }
        }),
    )];

    let unconfigure = vec![config_mutation::prune(
        "~/.codex/config.toml",
        ConfigFormat::Toml,
        json!({"model_providers": {"poe": {}}}),
    )];

    let models = CachedResource::new(
        vec!["gpt-4.1".to_string(), "o4-mini".to_string()],
        CacheConfig {
            cache_name: "codex-models".to_string(),
            cache_dir: ctx.cache_dir("poe-code"),
            api_endpoint: "https://api.poe.com/v1/models?provider=openai".to_string(),
            fetch_timeout: ctx.cache_ttls.fetch_timeout,
            stale_ttl: ctx.cache_ttls.stale_ttl,
            fresh_ttl: ctx.cache_ttls.fresh_ttl,
            offline: false,
            prefer_offline: false,
        },
        ctx.fs.clone(),
    );

    ProviderManifest {
        id: "codex",
        agent_binary: "codex",
        isolated_base: ".poe-code/codex",
        configure,
        unconfigure,
        dialect: Some(Dialect::Codex),
        models: Some(models),
    }
}
