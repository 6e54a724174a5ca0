//! Kimi CLI provider: same env-override shape as Claude Code, pointed at
//! Poe's Moonshot-compatible endpoint.

use super::{Dialect, ProviderContext, ProviderManifest};
use crate::cache::{CacheConfig, CachedResource};
use crate::mutation::builders::config_mutation;
use crate::mutation::ConfigFormat;
use serde_json::json;

const POE_BASE_URL: &str = "https://api.poe.com/moonshot";

pub fn manifest(ctx: &ProviderContext) -> ProviderManifest {
    let configure = vec![config_mutation::merge(
        "~/.kimi/config.json",
        ConfigFormat::Json,
        json!({
            "env": {
                "MOONSHOT_BASE_URL": POE_BASE_URL,
                "MOONSHOT_API_KEY": "${POE_API_KEY}",
            }
        }),
    )];

    let unconfigure = vec![config_mutation::prune(
        "~/.kimi/config.json",
        ConfigFormat::Json,
        json!({"env": {"MOONSHOT_BASE_URL": {}, "MOONSHOT_API_KEY": {}}}),
    )];

    let models = CachedResource::new(
        vec!["kimi-k2".to_string()],
        CacheConfig {
            cache_name: "kimi-models".to_string(),
            cache_dir: ctx.cache_dir("poe-code"),
            api_endpoint: "https://api.poe.com/v1/models?provider=moonshot".to_string(),
            fetch_timeout: ctx.cache_ttls.fetch_timeout,
            stale_ttl: ctx.cache_ttls.stale_ttl,
            fresh_ttl: ctx.cache_ttls.fresh_ttl,
            offline: false,
            prefer_offline: false,
        },
        ctx.fs.clone(),
    );

    ProviderManifest {
        id: "kimi",
        agent_binary: "kimi",
        isolated_base: ".poe-code/kimi",
        configure,
        unconfigure,
        dialect: Some(Dialect::Native),
        models: Some(models),
    }
}
