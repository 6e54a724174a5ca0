//! Claude Code provider: routes through Poe by overriding the Anthropic
//! base URL and auth token in `~/.claude.json`'s `env` block, the same
//! file the Claude-dialect stream adapter expects to accompany a running
//! Claude Code session.

use super::{Dialect, ProviderContext, ProviderManifest};
use crate::cache::{CacheConfig, CachedResource};
use crate::mutation::builders::config_mutation;
use crate::mutation::ConfigFormat;
use serde_json::json;

const POE_BASE_URL: &str = "https://api.poe.com/anthropic";

pub fn manifest(ctx: &ProviderContext) -> ProviderManifest {
    let configure = vec![config_mutation::merge(
        "~/.claude.json",
        ConfigFormat::Json,
        json!({
            "env": {
                "ANTHROPIC_BASE_URL": POE_BASE_URL,
                "ANTHROPIC_AUTH_TOKEN": "${POE_API_KEY}",
            }
        }),
    )];

    let unconfigure = vec![config_mutation::prune(
        "~/.claude.json",
        ConfigFormat::Json,
        json!({"env": {"ANTHROPIC_BASE_URL": {}, "ANTHROPIC_AUTH_TOKEN": {}}}),
    )];

    let models = CachedResource::new(
        vec!["claude-3.7-sonnet".to_string(), "claude-3.5-haiku".to_string()],
        CacheConfig {
            cache_name: "claude-models".to_string(),
            cache_dir: ctx.cache_dir("poe-code"),
            api_endpoint: "https://api.poe.com/v1/models?provider=anthropic".to_string(),
            fetch_timeout: ctx.cache_ttls.fetch_timeout,
            stale_ttl: ctx.cache_ttls.stale_ttl,
            fresh_ttl: ctx.cache_ttls.fresh_ttl,
            offline: false,
            prefer_offline: false,
        },
        ctx.fs.clone(),
    );

    ProviderManifest {
        id: "claude",
        agent_binary: "claude",
        isolated_base: ".poe-code/claude",
        configure,
        unconfigure,
        dialect: Some(Dialect::Claude),
        models: Some(models),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Codec;
    use crate::mutation::{run_mutations, MutationContext, Options};
    use crate::vfs::MemFs;
    use std::path::Path;
    use std::sync::Arc;

    #[tokio::test]
    async fn configure_writes_poe_base_url_and_token_placeholder() {
        let ctx = ProviderContext::new("/h", Arc::new(MemFs::new().with_dir("/h")));
        let provider = manifest(&ctx);
        let engine_ctx = MutationContext::new(ctx.fs.clone(), "/h");
        run_mutations(&provider.configure, &engine_ctx, &Options::new()).await.unwrap();
        let text = engine_ctx.fs.read_file(Path::new("/h/.claude.json")).await.unwrap();
        assert!(text.contains(POE_BASE_URL));
        assert!(text.contains("POE_API_KEY"));
    }

    #[tokio::test]
    async fn unconfigure_removes_only_the_poe_env_keys() {
        let initial = json!({"env": {"ANTHROPIC_BASE_URL": POE_BASE_URL, "ANTHROPIC_AUTH_TOKEN": "x", "OTHER": "keep"}});
        let fs = MemFs::new().with_dir("/h").with_file(
            "/h/.claude.json",
            crate::codec::json::JsonCodec.serialize(&initial).unwrap(),
        );
        let ctx = ProviderContext::new("/h", Arc::new(fs));
        let provider = manifest(&ctx);
        let engine_ctx = MutationContext::new(ctx.fs.clone(), "/h");
        run_mutations(&provider.unconfigure, &engine_ctx, &Options::new()).await.unwrap();
        let text = engine_ctx.fs.read_file(Path::new("/h/.claude.json")).await.unwrap();
        let doc = crate::codec::json::JsonCodec.parse(&text).unwrap();
        assert_eq!(doc, json!({"env": {"OTHER": "keep"}}));
    }
}
