mod cmd;
mod repl;

use std::process::ExitCode;

use clap::Parser;

use crate::cmd::{Cmd, EXIT_USAGE};

fn main() -> ExitCode {
    human_panic::setup_panic!();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cmd = match Cmd::try_parse() {
        Ok(cmd) => cmd,
        Err(err) => return ExitCode::from(cmd::parse_error_code(&err)),
    };

    match cmd.run() {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("error: {err:?}");
            ExitCode::from(EXIT_USAGE)
        }
    }
}
