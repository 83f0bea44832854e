use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use halaman::shell::{Outcome, Shell, ShellError};
use rustyline::{DefaultEditor, error::ReadlineError};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "halaman", version, about = "Interactive slotted page inspector")]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Page image to open instead of a fresh page")]
    load: Option<PathBuf>,

    #[arg(long, default_value_t = 0, help = "Special space for a fresh page (bytes)")]
    special_size: usize,

    #[arg(
        long,
        value_name = "FILE",
        env = "HALAMAN_HISTORY",
        default_value = ".halaman_history",
        help = "Command history file"
    )]
    history: PathBuf,
}

fn read_multiline_command(rl: &mut DefaultEditor) -> rustyline::Result<String> {
    let mut input = String::new();
    let mut prompt = "halaman> ".to_string();

    loop {
        let line = rl.readline(&prompt)?;
        let trimmed_line = line.trim_end();

        // Trailing backslash continues the command on the next line
        if let Some(head) = trimmed_line.strip_suffix('\\') {
            input.push_str(head);
            input.push(' ');
            prompt = "      -> ".to_string();
        } else {
            input.push_str(trimmed_line);
            break;
        }
    }

    Ok(input)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("halaman=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let shell = match &cli.load {
        Some(path) => Shell::open(path),
        None => Shell::new(cli.special_size),
    };
    let mut shell = match shell {
        Ok(shell) => shell,
        Err(err) => {
            error!(%err, "failed to open page");
            return ExitCode::FAILURE;
        }
    };

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(err) => {
            error!(%err, "failed to start line editor");
            return ExitCode::FAILURE;
        }
    };
    let _ = rl.load_history(&cli.history);

    println!("halaman page inspector, type 'help' for commands");
    let code = loop {
        let command = match read_multiline_command(&mut rl) {
            Ok(input) => input.trim().to_string(),
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break ExitCode::SUCCESS,
            Err(err) => {
                error!(%err, "readline failed");
                break ExitCode::FAILURE;
            }
        };
        if command.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(&command);

        match shell.execute(&command) {
            Ok(Outcome::Continue(output)) => println!("{}", output),
            Ok(Outcome::Exit) => break ExitCode::SUCCESS,
            Err(err) if err.is_fatal() => {
                // The page image is untrustworthy from here on
                error!(%err, "fatal page error, stopping");
                break ExitCode::from(2);
            }
            Err(ShellError::Page(err)) => println!("{}: {}", err.severity(), err),
            Err(err) => println!("{}", err),
        }
    };

    if let Err(err) = rl.save_history(&cli.history) {
        error!(%err, "failed to save history");
    }
    code
}
