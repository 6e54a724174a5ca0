use std::process::ExitCode;

fn main() -> ExitCode {
    poe_code::cli_entrypoint()
}
