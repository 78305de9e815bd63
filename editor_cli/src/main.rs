//! Strata - document inspector.
//!
//! Usage: strata FILE [--find PATTERN] [--ignore-case]
//!
//! Loads FILE in the background, highlights it and prints document
//! statistics. `STRATA_BUFFER_SIZE` and `STRATA_TAB_WIDTH` override the
//! document options.

use std::env;
use std::path::Path;
use std::process;
use std::sync::Arc;
use std::time::{Duration, Instant};
use strata_core::{
    Document, DocumentOptions, KeywordHighlighter, Language, MatchOptions, MonospaceMeasure,
    RegexMatcher, Scheduler,
};

const LOAD_TIMEOUT: Duration = Duration::from_secs(300);
const MAX_PRINTED_MATCHES: usize = 20;

struct Args {
    path: String,
    pattern: Option<String>,
    ignore_case: bool,
}

fn parse_args() -> Option<Args> {
    let mut path = None;
    let mut pattern = None;
    let mut ignore_case = false;
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--find" => pattern = Some(args.next()?),
            "--ignore-case" => ignore_case = true,
            _ if path.is_none() => path = Some(arg),
            _ => return None,
        }
    }
    Some(Args {
        path: path?,
        pattern,
        ignore_case,
    })
}

fn options_from_env() -> DocumentOptions {
    let mut options = DocumentOptions::default();
    if let Some(size) = env_number("STRATA_BUFFER_SIZE") {
        options.buffer_size = size;
    }
    if let Some(width) = env_number("STRATA_TAB_WIDTH") {
        options.tab_width = width;
    }
    options
}

fn env_number(name: &str) -> Option<usize> {
    let value = env::var(name).ok()?;
    match value.parse() {
        Ok(n) => Some(n),
        Err(_) => {
            log::warn!("Ignoring {}={:?}: not a number", name, value);
            None
        }
    }
}

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Some(args) = parse_args() else {
        eprintln!("usage: strata FILE [--find PATTERN] [--ignore-case]");
        process::exit(2);
    };

    let options = options_from_env();
    let language = Language::from_path(Path::new(&args.path));
    let scheduler = Scheduler::default();
    log::info!(
        "Starting Strata ({} workers, {} highlighting)",
        scheduler.threads(),
        language.name()
    );

    let document = match Document::builder()
        .options(options.clone())
        .measure(Arc::new(MonospaceMeasure::new(1.0, options.tab_width)))
        .highlighter(Arc::new(KeywordHighlighter::new(language)))
        .scheduler(scheduler.clone())
        .open(&args.path)
    {
        Ok(document) => document,
        Err(e) => {
            log::error!("{}", e);
            process::exit(1);
        }
    };

    let started = Instant::now();
    while !document.wait_until_loaded(Duration::from_millis(250)) {
        if started.elapsed() > LOAD_TIMEOUT {
            log::error!("Timed out loading {}", args.path);
            process::exit(1);
        }
        log::info!("Loading... {:.0}%", document.load_percentage());
    }
    if !scheduler.wait_idle(LOAD_TIMEOUT) {
        log::warn!("Highlighting did not finish");
    }

    {
        let state = document.read();
        println!("file:           {}", args.path);
        println!("lines:          {}", state.line_count());
        println!("buffers:        {}", state.buffers().len());
        println!("line ending:    {:?}", state.line_ending());
        println!("max line width: {}", state.max_line_width());
        if let Some(line) = state.longest_line() {
            println!("longest line:   {}", line + 1);
        }
    }
    println!("highlighted:    {}", document.is_highlighted());

    if let Some(pattern) = &args.pattern {
        let match_options = MatchOptions {
            case_sensitive: !args.ignore_case,
            literal: false,
        };
        let matcher = match RegexMatcher::new(pattern, match_options) {
            Ok(matcher) => matcher,
            Err(e) => {
                log::error!("{}", e);
                process::exit(1);
            }
        };
        let matches = document.find_all_matches(&matcher);
        println!("matches:        {}", matches.len());
        for found in matches.iter().take(MAX_PRINTED_MATCHES) {
            let line = document.line(found.start.line);
            println!(
                "  {}:{}: {}",
                found.start.line + 1,
                found.start.col + 1,
                String::from_utf8_lossy(&line).trim_end()
            );
        }
        if matches.len() > MAX_PRINTED_MATCHES {
            println!("  ...");
        }
    }

    log::info!("{}", document.perf().summary());
}
