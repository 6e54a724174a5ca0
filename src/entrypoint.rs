use crate::app::{exit_code_for, run, Deps};
use crate::cli;
use clap::Parser;
use std::process::ExitCode;

pub fn cli_entrypoint() -> ExitCode {
    cli_entrypoint_from(std::env::args_os())
}

pub(crate) fn cli_entrypoint_from<I, T>(args: I) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = match cli::Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() { ExitCode::FAILURE } else { ExitCode::SUCCESS };
        }
    };
    let deps = Deps::real();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to start the async runtime");
    exit_code_for(runtime.block_on(run(cli, &deps)))
}
