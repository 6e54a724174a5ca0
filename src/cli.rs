use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "poe-code", version, about = "Routes coding-agent CLIs through Poe")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Install Poe's routing overrides into an agent's own config.
    Configure(AgentArgs),
    /// Remove Poe's routing overrides from an agent's own config.
    Unconfigure(AgentArgs),
    /// Inspect or refresh an agent's cached model list.
    Cache(CacheArgs),
}

#[derive(Args, Debug, Clone)]
pub struct AgentArgs {
    pub agent: String,
    /// Compute and report the mutations without writing anything.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub dry_run: bool,
    /// Redirect the agent's config into an isolated subtree instead of its
    /// natural location.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub isolated: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CacheArgs {
    pub agent: String,
    #[command(subcommand)]
    pub resource: CacheResource,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CacheResource {
    Models {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum CacheAction {
    Refresh,
    Clear,
    Stats,
}
