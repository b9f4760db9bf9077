#![forbid(unsafe_code)]

use std::fs::File;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::process::exit;

use clap::Parser;
use convert_yaml::budget::BudgetReport;
use convert_yaml::converters::convert_handlers;
use convert_yaml::options::DocumentPolicy;
use convert_yaml::{Error, JsonOptions, Options};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const EXIT_USAGE: i32 = 1;
const EXIT_UNREADABLE: i32 = 2;
const EXIT_INVALID: i32 = 3;
const EXIT_WRITE: i32 = 4;

/// Convert an App Engine style YAML configuration file to JSON.
#[derive(Parser)]
#[command(name = "convert-yaml")]
#[command(version, about, long_about = None)]
struct Cli {
    /// YAML file to convert
    input: PathBuf,

    /// Write JSON to a file instead of stdout
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Indentation width
    #[arg(long, default_value_t = 2)]
    indent: usize,

    /// Single-line output
    #[arg(long, conflicts_with = "indent")]
    compact: bool,

    /// Escape non-ASCII characters
    #[arg(long)]
    ascii: bool,

    /// Restructure App Engine url handlers
    #[arg(long)]
    handlers: bool,

    /// Only true/false are booleans
    #[arg(long)]
    strict_booleans: bool,

    /// Reject streams with more than one document
    #[arg(long)]
    single_document: bool,

    /// Print the budget report to stderr
    #[arg(long)]
    budget_report: bool,

    /// Errors without source snippets
    #[arg(long)]
    plain: bool,

    /// More log output (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn report_budget(report: BudgetReport) {
    match serde_json::to_string_pretty(&report) {
        Ok(serialized) => eprintln!("Budget report:\n{serialized}"),
        Err(err) => eprintln!("Failed to serialize budget report: {err}"),
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(io::stderr().is_terminal()),
        )
        .init();
}

fn convert(text: &str, cli: &Cli) -> Result<String, Error> {
    let mut options = Options {
        strict_booleans: cli.strict_booleans,
        with_snippet: !cli.plain,
        ..Options::default()
    };
    if cli.single_document {
        options.documents = DocumentPolicy::Single;
    }
    if cli.budget_report {
        options = options.with_budget_report(report_budget);
    }
    let json = JsonOptions {
        indent: (!cli.compact).then_some(cli.indent),
        ascii_only: cli.ascii,
    };

    let mut value = convert_yaml::to_value_with_options(text, &options)?;
    if cli.handlers {
        convert_handlers(&mut value)?;
    }
    convert_yaml::encode(&value, &json)
}

fn write_output(json: &str, output: Option<&PathBuf>) -> io::Result<()> {
    match output {
        Some(path) => {
            let mut file = File::create(path)?;
            writeln!(file, "{json}")?;
            file.flush()
        }
        None => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{json}")?;
            stdout.flush()
        }
    }
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() { EXIT_USAGE } else { 0 };
            let _ = err.print();
            exit(code);
        }
    };
    init_tracing(cli.verbose);

    let path = cli.input.display().to_string();
    let text = match File::open(&cli.input)
        .map_err(Error::from)
        .and_then(convert_yaml::read_text)
    {
        Ok(text) => text,
        Err(err) => {
            eprintln!("Failed to read {path}: {err}");
            exit(EXIT_UNREADABLE);
        }
    };

    let json = match convert(&text, &cli) {
        Ok(json) => json,
        Err(err) => {
            eprintln!("{path} invalid:\n{err}");
            exit(EXIT_INVALID);
        }
    };

    if let Err(err) = write_output(&json, cli.output.as_ref()) {
        eprintln!("Failed to write output: {err}");
        exit(EXIT_WRITE);
    }
}
