use std::process::ExitCode;

fn main() -> ExitCode {
    trainhub_cli::run()
}
