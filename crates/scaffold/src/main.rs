use std::process::ExitCode;

fn main() -> anyhow::Result<ExitCode> {
    scaffold::init();

    scaffold::cli::run()
}
