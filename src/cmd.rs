use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use lox_common::error::{self, ErrorS};
use lox_interpreter::{Interpreter, Resolver};
use lox_syntax::printer;
use reedline::Signal;
use termcolor::{ColorChoice, StandardStream};

use crate::repl::{self, Prompt};

/// Exit code for scan, parse and resolve errors.
const EXIT_STATIC: u8 = 65;
/// Exit code for runtime errors.
const EXIT_RUNTIME: u8 = 70;
/// Exit code for usage errors and unreadable files.
pub const EXIT_USAGE: u8 = 64;

#[derive(Debug, Parser)]
#[clap(about, author, disable_help_subcommand = true, version)]
pub struct Cmd {
    /// Script to run. Starts a REPL when omitted; end each REPL submission
    /// with a line containing only ";;".
    path: Option<PathBuf>,
    /// Print how long interpretation took.
    #[clap(long)]
    time: bool,
    /// Print how long every stage took.
    #[clap(long)]
    time_all: bool,
    /// Echo the source and dump every token.
    #[clap(long)]
    debug_scanner: bool,
    /// Dump every parsed statement.
    #[clap(long)]
    debug_parser: bool,
}

impl Cmd {
    pub fn run(&self) -> Result<u8> {
        match &self.path {
            Some(path) => self.run_file(path),
            None => self.repl(),
        }
    }

    fn run_file(&self, path: &Path) -> Result<u8> {
        if !path.is_file() {
            eprintln!("error: file not found: {}", path.display());
            return Ok(EXIT_USAGE);
        }
        let source = fs::read_to_string(path)
            .with_context(|| format!("could not read file: {}", path.display()))?;
        info!("running {}", path.display());

        let stdout = io::stdout();
        let mut interpreter = Interpreter::new(stdout.lock());
        self.run_source(&mut interpreter, &source)
    }

    fn repl(&self) -> Result<u8> {
        let mut editor = repl::editor()?;
        let mut interpreter = Interpreter::new(io::stdout());
        println!("Welcome to treelox. Input {} on its own line to run.", repl::TERMINATOR);

        loop {
            match editor.read_line(&Prompt).context("could not read line")? {
                Signal::Success(buffer) => {
                    let code = self.run_source(&mut interpreter, repl::submission(&buffer))?;
                    debug!("submission finished with exit code {code}");
                }
                Signal::CtrlD => break,
                // CTRL-C discards the current buffer.
                _ => {}
            }
        }
        Ok(0)
    }

    /// Runs one program through every stage, honouring the debug and timing
    /// flags, and reports errors to stderr.
    fn run_source<W: Write>(&self, interpreter: &mut Interpreter<W>, source: &str) -> Result<u8> {
        let timer = Instant::now();
        let (tokens, errors) = lox_syntax::scan(source);
        self.time_stage("Scanner", timer);

        if self.debug_scanner {
            println!("{source}\n");
            for token in &tokens {
                println!("{token}");
            }
        }
        if !errors.is_empty() {
            report(source, error::merge_invalid_characters(errors))?;
            return Ok(EXIT_STATIC);
        }

        let timer = Instant::now();
        let (program, errors) = lox_syntax::parse(tokens);
        self.time_stage("Parser", timer);

        if !errors.is_empty() {
            report(source, errors)?;
            return Ok(EXIT_STATIC);
        }
        if self.debug_parser {
            for (idx, stmt_s) in program.stmts.iter().enumerate() {
                println!("{}: {}", idx + 1, printer::print_stmt(stmt_s));
            }
        }

        let timer = Instant::now();
        let resolved = Resolver::default().resolve(&program);
        self.time_stage("Resolver", timer);

        let locals = match resolved {
            Ok(locals) => locals,
            Err(errors) => {
                report(source, errors)?;
                return Ok(EXIT_STATIC);
            }
        };

        let timer = Instant::now();
        let result = interpreter.interpret(&program, locals);
        if self.time || self.time_all {
            println!("Interpreter (ms): {}", timer.elapsed().as_millis());
        }

        match result {
            Ok(()) => Ok(0),
            Err(error) => {
                report(source, vec![error])?;
                Ok(EXIT_RUNTIME)
            }
        }
    }

    fn time_stage(&self, stage: &str, timer: Instant) {
        if self.time_all {
            println!("{stage} (ms): {}", timer.elapsed().as_millis());
        }
    }
}

/// Prints a command-line parse failure and picks the exit code. `--help` and
/// `--version` arrive here too, and succeed unless their output cannot be
/// written, in which case there is nowhere left to report to.
pub fn parse_error_code(err: &clap::Error) -> u8 {
    match err.print() {
        Ok(()) if !err.use_stderr() => 0,
        _ => EXIT_USAGE,
    }
}

fn report(source: &str, errors: Vec<ErrorS>) -> Result<()> {
    let mut stderr = StandardStream::stderr(ColorChoice::Auto);
    error::report_err(&mut stderr, source, errors).context("could not report errors")
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    fn cmd(args: &[&str]) -> Cmd {
        Cmd::try_parse_from(std::iter::once("treelox").chain(args.iter().copied())).unwrap()
    }

    fn run(source: &str) -> (u8, String) {
        let mut stdout = Vec::new();
        let code = cmd(&[]).run_source(&mut Interpreter::new(&mut stdout), source).unwrap();
        (code, String::from_utf8(stdout).unwrap())
    }

    #[test]
    fn flags() {
        let cmd = cmd(&["script.lox", "--time-all", "--debug-parser"]);
        assert_eq!(Some(PathBuf::from("script.lox")), cmd.path);
        assert!(cmd.time_all && cmd.debug_parser);
        assert!(!cmd.time && !cmd.debug_scanner);
    }

    #[test]
    fn parse_errors() {
        let err = Cmd::try_parse_from(["treelox", "--bogus"]).unwrap_err();
        assert_eq!(EXIT_USAGE, parse_error_code(&err));
        let err = Cmd::try_parse_from(["treelox", "a.lox", "b.lox"]).unwrap_err();
        assert_eq!(EXIT_USAGE, parse_error_code(&err));
        let err = Cmd::try_parse_from(["treelox", "--version"]).unwrap_err();
        assert_eq!(0, parse_error_code(&err));
    }

    #[test]
    fn exit_codes() {
        assert_eq!((0, "3\n".to_string()), run("print 1 + 2;"));
        assert_eq!(EXIT_STATIC, run("print #;").0);
        assert_eq!(EXIT_STATIC, run("print (1;").0);
        assert_eq!(EXIT_STATIC, run("{ var a; var a; }").0);
        assert_eq!((EXIT_RUNTIME, "1\n".to_string()), run("print 1; print -nil;"));
    }

    #[test]
    fn missing_file() {
        assert_eq!(EXIT_USAGE, cmd(&["does/not/exist.lox"]).run().unwrap());
    }
}
