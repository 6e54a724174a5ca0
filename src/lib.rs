pub mod acp;
pub mod cache;
pub mod codec;
pub mod cli;
pub mod mutation;
pub mod path_mapper;
pub mod providers;
pub mod settings;
pub mod templates;
pub mod vfs;

mod entrypoint;

pub mod app;
pub use app::{exit_code_for, run, Deps};
pub use entrypoint::cli_entrypoint;
#[cfg(test)]
pub(crate) use entrypoint::cli_entrypoint_from;

#[cfg(test)]
mod test_support;

#[cfg(test)]
mod tests {
    use super::cli_entrypoint_from;
    use crate::{acp, cache, codec, mutation, path_mapper, providers, settings, templates, vfs};
    use std::process::ExitCode;

    #[test]
    fn lib_exposes_expected_modules() {
        let _ = codec::json::JsonCodec;
        let _ = vfs::StdFs;
        let _ = path_mapper::is_under_home;
        let _ = templates::TemplateRenderer::new;
        let _ = mutation::run_mutations;
        let _ = acp::classify_tool_call;
        let _ = cache::resolve_cache_dir;
        let _ = providers::registry::known_agents;
        let _ = settings::Settings::load;
    }

    #[test]
    fn cli_entrypoint_from_reports_missing_subcommand_as_a_clap_usage_error() {
        let code = cli_entrypoint_from(["poe-code"]);
        assert_eq!(code, ExitCode::FAILURE);
    }

    #[test]
    fn cli_entrypoint_from_runs_version() {
        let code = cli_entrypoint_from(["poe-code", "--version"]);
        assert_eq!(code, ExitCode::SUCCESS);
    }
}
