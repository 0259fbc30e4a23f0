//! Braggi CLI — command-line driver for the WFCCC compiler.
//!
//! The driver only constructs a compile context, feeds it source text, and
//! reads diagnostics back out; all the interesting work happens in
//! `braggi-compiler`.

mod config;

use braggi_compiler::compiler::emit::{SourceEmitter, TokenDumpEmitter};
use braggi_compiler::diagnostics::{diagnostics_to_json, render_ansi, render_plain};
use braggi_compiler::{compile, Context};
use clap::Parser;
use std::path::PathBuf;

const EXIT_OK: i32 = 0;
const EXIT_COMPILE_FAILED: i32 = 1;
// Usage errors exit with 2 via clap's default behaviour.
const EXIT_IO: i32 = 3;

#[derive(Parser)]
#[command(
    name = "braggi",
    version,
    about = "The Braggi programming language — wave function constraint collapse compilation",
    help_template = "\
{before-help}{name} {version}
{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}

Examples:
  braggi hello.bg                  Compile and print the collapsed output
  braggi -o out.bg hello.bg        Write the collapsed output to a file
  braggi --tokens hello.bg         Dump the collapsed token stream
  braggi --diagnostics-json bad.bg Print diagnostics as a JSON array
"
)]
struct Cli {
    /// Input source file
    input: PathBuf,

    /// Write output to FILE instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Verbose progress output on stderr
    #[arg(short, long)]
    verbose: bool,

    /// Optimization level, forwarded to the emitter as a hint
    #[arg(short = 'O', value_name = "LEVEL", value_parser = clap::value_parser!(u8).range(0..=3))]
    opt_level: Option<u8>,

    /// Print diagnostics as an editor-consumable JSON array on stdout
    #[arg(long)]
    diagnostics_json: bool,

    /// Dump the collapsed token stream instead of emitted output
    #[arg(long)]
    tokens: bool,
}

fn main() {
    let cli = Cli::parse();
    std::process::exit(run(cli));
}

fn run(cli: Cli) -> i32 {
    let config = config::load();
    let opt_level = cli.opt_level.unwrap_or(config.build.opt_level);

    let text = match std::fs::read_to_string(&cli.input) {
        Ok(text) => text,
        Err(err) => {
            eprintln!("braggi: cannot read {}: {}", cli.input.display(), err);
            return EXIT_IO;
        }
    };
    let name = cli.input.display().to_string();

    let mut context = match compile(&name, &text) {
        Ok(context) => context,
        Err(err) => {
            eprintln!("braggi: internal error: {}", err);
            return EXIT_COMPILE_FAILED;
        }
    };

    if cli.verbose {
        eprintln!(
            "braggi: {} cells, {} constraints, {} observations, -O{}",
            context.field.cells().len(),
            context.field.constraints().len(),
            context.collapse_log.len(),
            opt_level
        );
    }

    if !context.succeeded() {
        report(&context, &cli, config.build.color);
        return EXIT_COMPILE_FAILED;
    }

    if cli.tokens {
        let mut emitter = TokenDumpEmitter::new();
        if context.emit(&mut emitter).is_err() {
            report(&context, &cli, config.build.color);
            return EXIT_COMPILE_FAILED;
        }
        print!("{}", emitter.into_output());
        return EXIT_OK;
    }

    let mut emitter = SourceEmitter::new();
    if context.emit(&mut emitter).is_err() {
        report(&context, &cli, config.build.color);
        return EXIT_COMPILE_FAILED;
    }
    let output = emitter.into_output();

    match &cli.output {
        Some(path) => {
            if let Err(err) = std::fs::write(path, output) {
                eprintln!("braggi: cannot write {}: {}", path.display(), err);
                return EXIT_IO;
            }
        }
        None => print!("{}", output),
    }
    EXIT_OK
}

fn report(context: &Context, cli: &Cli, color: bool) {
    if cli.diagnostics_json {
        println!("{}", diagnostics_to_json(context.diagnostics()));
        return;
    }
    for diagnostic in context.diagnostics() {
        let rendered = if color {
            render_ansi(diagnostic, &context.sources)
        } else {
            render_plain(diagnostic, &context.sources)
        };
        eprint!("{}", rendered);
    }
}
