//! Pure factory functions assembling `Mutation` values, grouped the way the
//! provider manifests in `src/providers` want to call them: one module per
//! mutation family (`file_mutation`, `config_mutation`, `template_mutation`).
//! None of these touch the filesystem; they only build data for
//! `run_mutations` to execute later.

use super::{
    ConfigFormat, Mutation, MutationKind, PredicateFn, RemoveFileGuards, Resolved, TransformFn,
};
use crate::codec::Document;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;

pub mod file_mutation {
    use super::*;

    pub fn ensure_directory(path: impl Into<String>) -> Mutation {
        Mutation::new(MutationKind::EnsureDirectory { path: Resolved::Literal(path.into()) })
    }

    pub fn remove_directory(path: impl Into<String>, force: bool) -> Mutation {
        Mutation::new(MutationKind::RemoveDirectory { path: Resolved::Literal(path.into()), force })
    }

    pub fn remove_file(target: impl Into<String>) -> Mutation {
        Mutation::new(MutationKind::RemoveFile {
            target: Resolved::Literal(target.into()),
            guards: RemoveFileGuards::default(),
        })
    }

    pub fn remove_file_when_empty(target: impl Into<String>) -> Mutation {
        Mutation::new(MutationKind::RemoveFile {
            target: Resolved::Literal(target.into()),
            guards: RemoveFileGuards { when_empty: true, when_content_matches: None },
        })
    }

    pub fn remove_file_when_matches(target: impl Into<String>, pattern: Regex) -> Mutation {
        Mutation::new(MutationKind::RemoveFile {
            target: Resolved::Literal(target.into()),
            guards: RemoveFileGuards { when_empty: false, when_content_matches: Some(Arc::new(pattern)) },
        })
    }

    pub fn chmod(target: impl Into<String>, mode: u32) -> Mutation {
        Mutation::new(MutationKind::Chmod { target: Resolved::Literal(target.into()), mode })
    }

    pub fn backup(target: impl Into<String>) -> Mutation {
        Mutation::new(MutationKind::Backup { target: Resolved::Literal(target.into()) })
    }
}

pub mod config_mutation {
    use super::*;

    pub fn merge(target: impl Into<String>, format: ConfigFormat, value: Document) -> Mutation {
        Mutation::new(MutationKind::ConfigMerge {
            target: Resolved::Literal(target.into()),
            format,
            value: Resolved::Literal(value),
            prune_by_prefix: None,
        })
    }

    pub fn merge_dynamic(
        target: impl Into<String>,
        format: ConfigFormat,
        value: Arc<dyn Fn(&crate::mutation::Options) -> Document + Send + Sync>,
    ) -> Mutation {
        Mutation::new(MutationKind::ConfigMerge {
            target: Resolved::Literal(target.into()),
            format,
            value: Resolved::Dynamic(value),
            prune_by_prefix: None,
        })
    }

    pub fn merge_pruning_prefix(
        target: impl Into<String>,
        format: ConfigFormat,
        value: Document,
        prune_by_prefix: Vec<(String, String)>,
    ) -> Mutation {
        Mutation::new(MutationKind::ConfigMerge {
            target: Resolved::Literal(target.into()),
            format,
            value: Resolved::Literal(value),
            prune_by_prefix: Some(prune_by_prefix),
        })
    }

    pub fn prune(target: impl Into<String>, format: ConfigFormat, shape: Document) -> Mutation {
        Mutation::new(MutationKind::ConfigPrune {
            target: Resolved::Literal(target.into()),
            format,
            shape,
            only_if: None,
        })
    }

    pub fn prune_only_if(
        target: impl Into<String>,
        format: ConfigFormat,
        shape: Document,
        predicate: PredicateFn,
    ) -> Mutation {
        Mutation::new(MutationKind::ConfigPrune {
            target: Resolved::Literal(target.into()),
            format,
            shape,
            only_if: Some(predicate),
        })
    }

    pub fn transform(target: impl Into<String>, format: ConfigFormat, transform: TransformFn) -> Mutation {
        Mutation::new(MutationKind::ConfigTransform { target: Resolved::Literal(target.into()), format, transform })
    }
}

pub mod template_mutation {
    use super::*;

    pub fn write(target: impl Into<String>, template_id: impl Into<String>) -> Mutation {
        Mutation::new(MutationKind::TemplateWrite {
            target: Resolved::Literal(target.into()),
            template_id: template_id.into(),
            context: None,
        })
    }

    pub fn write_with_context(
        target: impl Into<String>,
        template_id: impl Into<String>,
        context: Value,
    ) -> Mutation {
        Mutation::new(MutationKind::TemplateWrite {
            target: Resolved::Literal(target.into()),
            template_id: template_id.into(),
            context: Some(Resolved::Literal(context)),
        })
    }

    pub fn merge_toml(target: impl Into<String>, template_id: impl Into<String>, context: Value) -> Mutation {
        Mutation::new(MutationKind::TemplateMergeToml {
            target: Resolved::Literal(target.into()),
            template_id: template_id.into(),
            context: Some(Resolved::Literal(context)),
        })
    }

    pub fn merge_json(target: impl Into<String>, template_id: impl Into<String>, context: Value) -> Mutation {
        Mutation::new(MutationKind::TemplateMergeJson {
            target: Resolved::Literal(target.into()),
            template_id: template_id.into(),
            context: Some(Resolved::Literal(context)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::{MutationContext, Options, run_mutations};
    use crate::vfs::MemFs;
    use serde_json::json;
    use std::path::Path;

    #[tokio::test]
    async fn file_and_config_builders_compose_into_a_working_run() {
        let fs = MemFs::new().with_dir("/h");
        let ctx = MutationContext::new(Arc::new(fs), "/h");
        let mutations = vec![
            file_mutation::ensure_directory("~/.poe-code"),
            config_mutation::merge("~/.claude.json", ConfigFormat::Json, json!({"a": 1})),
        ];
        let outcome = run_mutations(&mutations, &ctx, &Options::new()).await.unwrap();
        assert!(outcome.changed);
        assert!(ctx.fs.exists(Path::new("/h/.poe-code")).await.unwrap());
        assert!(ctx.fs.exists(Path::new("/h/.claude.json")).await.unwrap());
    }
}
