use std::io::Write;

use clap::{App, Arg, ArgMatches};
use itertools::Itertools;
use slog::{info, o, Drain, Logger};
use slog_term::{FullFormat, TermDecorator};

use sim88::{
    asm::{self, metadata},
    emulator::{ControlSignal, DevicesConfiguration, MemoryFill, Simulator},
    error::SimulatorError,
    program::Symbol,
};

enum Error {
    Assembly,
    Execution(SimulatorError),
    IO(std::io::Error),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Error {
        Error::IO(e)
    }
}

impl From<SimulatorError> for Error {
    fn from(e: SimulatorError) -> Error {
        Error::Execution(e)
    }
}

fn parse_arguments() -> ArgMatches<'static> {
    App::new("sim88run")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Assembles a program for the course machine and runs it to completion")
        .arg(
            Arg::with_name("source")
                .help("File containing assembly source")
                .value_name("SOURCE")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("verbose")
                .help("Enables verbose logging")
                .long("verbose")
                .short("v"),
        )
        .arg(
            Arg::with_name("steps")
                .help("Maximum number of instructions to execute")
                .long("steps")
                .takes_value(true)
                .default_value("100000"),
        )
        .arg(
            Arg::with_name("fill")
                .help("Contents of the memory cells the program leaves unassigned")
                .long("fill")
                .takes_value(true)
                .possible_values(&["zero", "randomize", "keep-previous"])
                .default_value("zero"),
        )
        .arg(
            Arg::with_name("devices")
                .help("Overrides the ;;devices= comment of the source file")
                .long("devices")
                .takes_value(true)
                .possible_values(&["switches-and-leds", "printer-pio", "printer-handshake"]),
        )
        .get_matches()
}

fn main() {
    let args = parse_arguments();

    match run(&args) {
        Ok(()) => (),
        Err(Error::Assembly) => std::process::exit(1),
        Err(Error::Execution(error)) => {
            eprintln!("Execution error: {}", error);
            std::process::exit(1);
        }
        Err(Error::IO(io)) => {
            eprintln!("IO error: {}", io);
            std::process::exit(1);
        }
    }
}

fn run(args: &ArgMatches) -> Result<(), Error> {
    let file_path = args.value_of("source").unwrap();
    let source = std::fs::read_to_string(file_path)?;

    let logger = if args.is_present("verbose") {
        let decorator = TermDecorator::new().build();
        let drain = FullFormat::new(decorator).build().fuse();
        let drain = slog_async::Async::new(drain).build().fuse();
        Some(Logger::root(drain, o!()))
    } else {
        None
    };

    let program = match asm::assemble_with_logger(&source, logger.clone()) {
        Ok(program) => program,
        Err(errors) => {
            for error in &errors {
                eprintln!("{}", error.verbose(&source));
            }
            return Err(Error::Assembly);
        }
    };

    let configuration = match args.value_of("devices") {
        Some(name) => name.parse::<DevicesConfiguration>().ok(),
        None => metadata::extract(&source)
            .get("devices")
            .and_then(|value| value.as_text())
            .and_then(|name| name.parse::<DevicesConfiguration>().ok()),
    }
    .unwrap_or(DevicesConfiguration::SwitchesAndLeds);

    let fill = match args.value_of("fill").unwrap() {
        "randomize" => MemoryFill::Randomize,
        "keep-previous" => MemoryFill::KeepPrevious,
        _ => MemoryFill::Zero,
    };

    let max_steps: u64 = args.value_of("steps").unwrap().parse().unwrap_or(100_000);

    let mut simulator = Simulator::new();
    simulator.load_program(&program, fill, configuration);

    if let Some(ref logger) = logger {
        info!(logger, "program loaded";
            "devices" => configuration.name(),
            "instructions" => program.instructions.len()
        );

        let symbols = program
            .symbols
            .iter()
            .map(|symbol| match symbol {
                Symbol::Instruction { name, address } => format!("{} @ {:04X}h", name, address),
                Symbol::Data { name, address, .. } => format!("{} @ {:04X}h", name, address),
                Symbol::Constant { name, value } => format!("{} = {}", name, value),
            })
            .join(", ");

        if !symbols.is_empty() {
            info!(logger, "symbols"; "table" => symbols);
        }
    }

    // One instruction per virtual millisecond.
    for now in 1..=max_steps {
        simulator.tick(now);

        match simulator.step()? {
            ControlSignal::Continue => {}
            ControlSignal::Halt => break,
            ControlSignal::StartDebugger => {
                // There is no debugger to hand over to; report and resume.
                if let Some(ref logger) = logger {
                    info!(logger, "breakpoint"; "ip" => simulator.registers().ip);
                }
            }
            ControlSignal::WaitForInput => {
                let character = read_character()?;
                simulator.handle_int6(character)?;
            }
        }
    }

    let text = simulator.console_text();
    if !text.is_empty() {
        println!("{}", text);
    }

    if let Some(ref logger) = logger {
        info!(logger, "finished";
            "halted" => simulator.halted(),
            "ip" => simulator.registers().ip
        );
    }

    Ok(())
}

fn read_character() -> Result<char, Error> {
    print!("? ");
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;

    Ok(line.chars().next().unwrap_or('\n'))
}
