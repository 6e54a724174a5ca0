//! OpenCode provider: registers Poe as an OpenAI-compatible provider in
//! `~/.config/opencode/opencode.json`.

use super::{ProviderContext, ProviderManifest};
use crate::cache::{CacheConfig, CachedResource};
use crate::mutation::builders::config_mutation;
use crate::mutation::ConfigFormat;
use serde_json::json;

const POE_BASE_URL: &str = "https://api.poe.com/openai/v1";

pub fn manifest(ctx: &ProviderContext) -> ProviderManifest {
    let configure = vec![config_mutation::merge(
        "~/.config/opencode/opencode.json",
        ConfigFormat::Jsonc,
        json!({
            "provider": {
                "poe": {
                    "npm": "@ai-sdk/openai-compatible",
                    "options": {
                        "baseURL": POE_BASE_URL,
                        "apiKey": "{env:POE_API_KEY}",
                    }
                }
            }
        }),
    )];

    let unconfigure = vec![config_mutation::prune(
        "~/.config/opencode/opencode.json",
        ConfigFormat::Jsonc,
        json!({"provider": {"poe": {}}}),
    )];

    let models = CachedResource::new(
        Vec::<String>::new(),
        CacheConfig {
            cache_name: "opencode-models".to_string(),
            cache_dir: ctx.cache_dir("poe-code"),
            api_endpoint: "https://api.poe.com/v1/models".to_string(),
            fetch_timeout: ctx.cache_ttls.fetch_timeout,
            stale_ttl: ctx.cache_ttls.stale_ttl,
            fresh_ttl: ctx.cache_ttls.fresh_ttl,
            offline: false,
            prefer_offline: false,
        },
        ctx.fs.clone(),
    );

    ProviderManifest {
        id: "opencode",
        agent_binary: "opencode",
        isolated_base: ".poe-code/opencode",
        configure,
        unconfigure,
        dialect: None,
        models: Some(models),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::{run_mutations, MutationContext, Options};
    use crate::vfs::MemFs;
    use std::path::Path;
    use std::sync::Arc;

    #[tokio::test]
    async fn configure_registers_poe_as_a_provider() {
        let ctx = ProviderContext::new("/h", Arc::new(MemFs::new().with_dir("/h")));
        let provider = manifest(&ctx);
        let engine_ctx = MutationContext::new(ctx.fs.clone(), "/h");
        run_mutations(&provider.configure, &engine_ctx, &Options::new()).await.unwrap();
        let text = engine_ctx.fs.read_file(Path::new("/h/.config/opencode/opencode.json")).await.unwrap();
        assert!(text.contains(POE_BASE_URL));
        assert!(text.contains("openai-compatible"));
    }

    #[tokio::test]
    async fn configure_preserves_comments_in_an_existing_file() {
        let existing = "{\n  // kept from before\n  \"theme\": \"dark\"\n}";
        let fs = MemFs::new()
            .with_dir("/h")
            .with_file("/h/.config/opencode/opencode.json", existing);
        let ctx = ProviderContext::new("/h", Arc::new(fs));
        let provider = manifest(&ctx);
        let engine_ctx = MutationContext::new(ctx.fs.clone(), "/h");
        run_mutations(&provider.configure, &engine_ctx, &Options::new()).await.unwrap();
        let text = engine_ctx.fs.read_file(Path::new("/h/.config/opencode/opencode.json")).await.unwrap();
        assert!(text.contains("// kept from before"));
        assert!(text.contains("\"theme\": \"dark\""));
        assert!(text.contains(POE_BASE_URL));
    }
}
