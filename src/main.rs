use std::process::ExitCode;

use scaffold_upgrade::cli;
use scaffold_upgrade::ui::output;
use scaffold_upgrade::ui::report::EXIT_ERROR;

fn main() -> ExitCode {
    match cli::run() {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            output::error(format!("{err:#}"));
            ExitCode::from(EXIT_ERROR)
        }
    }
}
