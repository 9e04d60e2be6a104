//! Entrypoint for CLI
use std::{env, fs, process, time::Instant};

use chip8::{prelude::*, IMPL_VERSION};
use log::{error, info};

use crate::{config::Config, error::AppError, terminal::Terminal};

mod config;
mod error;
mod terminal;

static USAGE: &str = r#"
usage: chip8 CMD FILE [CONFIG]

commands:
    run     Run the target ROM file

Type keys followed by enter to press them, and :q to quit.

    1 2 3 4         1 2 3 C
    q w e r   =>    4 5 6 D
    a s d f         7 8 9 E
    z x c v         A 0 B F

examples:
    chip8 run maze.ch8
    chip8 run breakout.ch8 chip8.yaml
"#;

fn run_rom(filepath: &str, config_path: Option<&str>) -> Result<(), AppError> {
    let config = match config_path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let bytecode = fs::read(filepath)?;

    let mut vm = Chip8Vm::new(config.vm_conf());
    vm.load_bytecode(bytecode.as_slice())?;

    let mut terminal = Terminal::new(config.key_lookup())?;

    info!("running {filepath}");

    let start = Instant::now();
    let result = match config.max_steps {
        Some(step_count) => vm.run_steps(step_count, &mut terminal).map(|_| ()),
        None => vm.execute(&mut terminal),
    };
    let end = Instant::now();

    terminal.present()?;

    info!(
        "time taken: {}ms",
        end.duration_since(start).as_nanos() as f64 / 1000000.0
    ); // to millis

    result?;

    Ok(())
}

fn main() {
    if let Err(err) = simple_logger::SimpleLogger::new().env().init() {
        eprintln!("failed to initialise logger: {err}");
    }

    let result = match parse_args() {
        Some(Cmd::Run { filepath, config }) => run_rom(&filepath, config.as_deref()),
        None => {
            print_usage();
            // FreeBSD EX_USAGE (64)
            process::exit(64)
        }
    };

    if let Err(err) = result {
        error!("{err}");
        process::exit(1)
    }
}

fn parse_args() -> Option<Cmd> {
    let mut args = env::args().skip(1);
    match args.next()?.as_str() {
        "run" => Some(Cmd::Run {
            filepath: consume_arg(&mut args)?,
            config: args.next(),
        }),
        _ => None,
    }
}

/// Consumes the next argument, which must exist.
fn consume_arg(mut args: impl Iterator<Item = String>) -> Option<String> {
    args.next()
}

fn print_usage() {
    println!("Chip8 v{IMPL_VERSION}");
    println!("{USAGE}");
}

enum Cmd {
    /// Run file
    Run {
        filepath: String,
        config: Option<String>,
    },
}
