use std::process::ExitCode;

fn main() -> ExitCode {
    yamlenv_cli::run()
}
