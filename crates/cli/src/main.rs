use std::process::ExitCode;

fn main() -> ExitCode {
    timebot_cli::run()
}
