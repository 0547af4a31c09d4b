use std::process::ExitCode;

fn main() -> ExitCode {
    schema_harness::cli::run()
}
