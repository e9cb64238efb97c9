#![forbid(unsafe_code)]

#[macro_use]
extern crate log;

#[macro_use]
extern crate derive_builder;

mod configuration;
mod reporter;
mod source;

use log::LevelFilter;
use signal_hook::{
    consts::{SIGINT, SIGTERM},
    iterator::Signals,
};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::exit;
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use structopt::StructOpt;

use self::configuration::{
    command_line::{LogLevel, Opt},
    constants::common::INTERRUPTED_EXIT_CODE,
    settings::Settings,
};
use self::reporter::coordinator::{LogChannel, Reporter};
use self::source::driver::Driver;

macro_rules! lock {
    ($name: expr) => {
        match $name.lock() {
            Ok(locked) => locked,
            Err(poisoned) => poisoned.into_inner(),
        }
    };
}

fn main() {
    let options = Opt::from_args();

    if let Err(e) = init_logging(
        options.logging.unwrap_or(LogLevel::Warn).into(),
        &options.log_output_file,
    ) {
        eprintln!("Failed to initialize logging: {}", e);
        exit(2);
    }

    let settings = match Settings::load(options.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load settings {}", e);
            exit(2);
        }
    };
    debug!("Loaded settings {:#?}", settings);

    let output = match open_output(&settings) {
        Ok(output) => output,
        Err(e) => {
            error!("Failed to open output {:?}: {}", settings.output, e);
            exit(2);
        }
    };
    let reporter = Reporter::new(output, Box::new(LogChannel))
        .heal_unreported(settings.heal_unreported && !options.no_heal)
        .flush_each_line(settings.flush_each_line);
    let driver = Arc::new(Mutex::new(Driver::new(reporter)));

    if let Err(e) = watch_signals(Arc::downgrade(&driver)) {
        warn!("Signal handling unavailable, interrupted runs stay open: {}", e);
    }

    let input: Box<dyn BufRead> = match &options.input {
        Some(path) => match File::open(path) {
            Ok(file) => Box::new(BufReader::new(file)),
            Err(e) => {
                error!("Failed to open events file {:?}: {}", path, e);
                exit(2);
            }
        },
        None => Box::new(BufReader::new(io::stdin())),
    };
    pump(input, &driver);

    lock!(driver).terminate();
}

fn pump(input: Box<dyn BufRead>, driver: &Arc<Mutex<Driver>>) {
    for line in input.lines() {
        match line {
            Ok(line) => lock!(driver).handle_line(&line),
            Err(e) => {
                error!("Failed to read events: {}", e);
                break;
            }
        }
    }
}

/// Runs the abnormal termination path on SIGINT/SIGTERM. The thread only
/// holds a weak reference, so a driver already torn down is left alone.
fn watch_signals(driver: Weak<Mutex<Driver>>) -> io::Result<()> {
    let mut signals = Signals::new(&[SIGINT, SIGTERM])?;

    thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            info!("Received signal {:?}, stopping", sig);
            if let Some(driver) = driver.upgrade() {
                lock!(driver).terminate();
            }
            exit(INTERRUPTED_EXIT_CODE);
        }
    });
    Ok(())
}

fn open_output(settings: &Settings) -> io::Result<Box<dyn Write + Send>> {
    Ok(match &settings.output {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(io::stdout()),
    })
}

fn init_logging(level: LevelFilter, output: &Option<PathBuf>) -> Result<(), fern::InitError> {
    let mut dispatcher = fern::Dispatch::new()
        // Perform allocation-free log formatting
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}:{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                record.target(),
                record
                    .line()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "".to_owned()),
                record.level(),
                message
            ))
        })
        .level(level)
        // stdout carries the message stream
        .chain(io::stderr());

    if let Some(log_file) = output {
        dispatcher = dispatcher.chain(fern::log_file(log_file)?)
    }
    dispatcher.apply()?;
    info!("Logging level {} enabled", level);
    Ok(())
}
