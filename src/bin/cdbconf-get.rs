//! Prints values from a configuration module.
use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
    process::ExitCode,
};

use cdbconf::{Module, Registry, ResolveOptions, tracing_config, watcher::NoWatch};
use clap::Parser;

#[derive(Parser)]
#[command(name = "cdbconf-get")]
#[command(about = "Get values from a configuration module")]
struct Cli {
    /// Module name or path
    #[arg(short, long, default_value = "TREE")]
    module: String,

    /// Directory module names are resolved in
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Read paths from stdin, one per line
    #[arg(short, long, conflicts_with = "bool")]
    interactive: bool,

    /// Exit with 0 if the value is true and 1 otherwise
    #[arg(short, long)]
    bool: bool,

    /// Parameter path, e.g. /service/timeout
    #[arg(required_unless_present = "interactive")]
    path: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = tracing_config::init("warn") {
        eprintln!("Failed to initialize logging: {err}");
    }

    let mut options = ResolveOptions::default();
    if let Some(dir) = cli.dir {
        options = options.with_dir(dir);
    }

    let registry = if cli.interactive {
        Registry::new(options)
    } else {
        Registry::with_dir_watch(options, NoWatch)
    };

    let module = match registry.open(&cli.module) {
        Ok(module) => module,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(2);
        }
    };

    if cli.interactive {
        return match interactive(&module) {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("{err}");
                ExitCode::FAILURE
            }
        };
    }

    let Some(path) = cli.path else {
        return ExitCode::from(2);
    };

    if cli.bool {
        return if module.get_bool(&path, false) {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        };
    }

    print_value(&module, &path);
    ExitCode::SUCCESS
}

fn interactive(module: &Module) -> io::Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("Enter path: ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            println!();
            return Ok(());
        };

        print_value(module, line?.trim());
    }
}

fn print_value(module: &Module, path: &str) {
    match module.get_string_if_exists(path) {
        Some(value) => println!("{value}"),
        None => eprintln!("No such key"),
    }
}
