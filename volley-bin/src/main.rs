mod config;
mod dispatch;
mod reporting;

use crate::config::{parse_percentiles, Config, FileConfig};
use crate::dispatch::run_and_report;
use crate::reporting::Report;
use anyhow::{Context, Error};
use clap::{value_t, App, Arg, ArgMatches};
use slog::{o, Drain, Level};

fn root_logger(level: Level) -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let async_drain = slog_async::Async::new(drain).build().fuse();
    let level_filter = slog::LevelFilter(async_drain, level).fuse();
    slog::Logger::root(level_filter, o!())
}

fn app() -> App<'static, 'static> {
    App::new("Volley")
        .version("0.1")
        .author("Benn Sundsrud <benn.sundsrud@gmail.com>")
        .about("Fire concurrent GET requests at a URL and report latency")
        .arg(
            Arg::with_name("url")
                .value_name("URL")
                .help("URL to request")
                .index(1),
        )
        .arg(
            Arg::with_name("workers")
                .short("w")
                .long("workers")
                .value_name("N")
                .help("Number of concurrent workers [default: 1]")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("requests")
                .short("r")
                .long("requests")
                .value_name("N")
                .help("Number of requests per worker [default: 1]")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("status")
                .short("s")
                .long("status")
                .value_name("CODE")
                .help("Response status considered a success [default: 200]")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("percentiles")
                .short("p")
                .long("percentiles")
                .value_name("RANKS")
                .help("Comma separated percentiles to report [default: 0,25,50,75,100]")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("no-keepalive")
                .long("no-keepalive")
                .help("Open a new connection for every request"),
        )
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("Path to config file")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("v")
                .short("v")
                .multiple(true)
                .help("Sets verbosity level"),
        )
}

fn command_line_config(matches: &ArgMatches) -> Result<FileConfig, Error> {
    let workers = if matches.is_present("workers") {
        Some(value_t!(matches, "workers", usize).unwrap_or_else(|e| e.exit()))
    } else {
        None
    };
    let requests = if matches.is_present("requests") {
        Some(value_t!(matches, "requests", usize).unwrap_or_else(|e| e.exit()))
    } else {
        None
    };
    let success_status = if matches.is_present("status") {
        Some(value_t!(matches, "status", u16).unwrap_or_else(|e| e.exit()))
    } else {
        None
    };
    let percentiles = matches
        .value_of("percentiles")
        .map(parse_percentiles)
        .transpose()?;
    let keep_alive = if matches.is_present("no-keepalive") {
        Some(false)
    } else {
        None
    };
    Ok(FileConfig {
        url: matches.value_of("url").map(String::from),
        workers,
        requests,
        success_status,
        percentiles,
        keep_alive,
    })
}

fn load_config(matches: &ArgMatches) -> Result<Config, Error> {
    let file = match matches.value_of("config") {
        Some(path) => {
            FileConfig::load(path).with_context(|| format!("Could not load config {}", path))?
        }
        None => FileConfig::default(),
    };
    let cli = command_line_config(matches)?;
    Ok(Config::resolve(file.merge(cli))?)
}

fn main() {
    let matches = app().get_matches();
    let config = match load_config(&matches) {
        Ok(conf) => conf,
        Err(e) => {
            eprintln!("{:#}", e);
            std::process::exit(1);
        }
    };
    let level = match matches.occurrences_of("v") {
        0 => Level::Warning,
        1 => Level::Info,
        2 => Level::Debug,
        3 => Level::Trace,
        _ => {
            eprintln!("WARNING: more than -vvv is ignored");
            Level::Trace
        }
    };
    let outcome = {
        let logger = root_logger(level);
        run_and_report(&config, &logger)
    };
    match outcome {
        Ok(stats) => print!("{}", Report::new(&stats, &config.percentiles)),
        Err(e) => {
            eprintln!("Error running load: {}", e);
            std::process::exit(1);
        }
    }
}
