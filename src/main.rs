//! Terminal reader for the chapter streaming engine.
//!
//! Responsibilities here are kept small:
//! - Parse command-line arguments and load `conf/config.toml`.
//! - Wire the HTTP content source and telemetry sink into a session.
//! - Translate stdin commands into session calls and print what arrives.

use anyhow::{Context, Result, anyhow};
use chapterflow::chapter::{Direction, FIRST_CHAPTER_NUMBER, ReadingMode};
use chapterflow::config::{AppConfig, load_config};
use chapterflow::fetcher::HttpContentSource;
use chapterflow::proximity::ManualProximityTrigger;
use chapterflow::render::{render_chapter, render_status, render_toc_page};
use chapterflow::session::{
    LoadStatus, ReadingSessionController, SessionHandle, SessionServices, SessionSettings,
    SessionSnapshot,
};
use chapterflow::telemetry::{HttpTelemetrySink, TelemetrySink};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

const USAGE: &str =
    "Usage: chapterflow [--config PATH] [--single|--continuous] <novel-id> [chapter]";

fn main() {
    let reload_handle = init_tracing();
    if let Err(err) = run(&reload_handle) {
        error!("{err:?}");
        std::process::exit(1);
    }
}

#[derive(Debug, PartialEq)]
struct CliArgs {
    config_path: PathBuf,
    mode: Option<ReadingMode>,
    novel_id: String,
    chapter_number: u32,
}

fn run(reload_handle: &ReloadHandle) -> Result<()> {
    let args = parse_args(env::args().skip(1))?;
    let config = load_config(&args.config_path);
    set_log_level(reload_handle, config.log_level.as_filter_str());
    info!(
        novel_id = %args.novel_id,
        chapter = args.chapter_number,
        base_url = %config.content_base_url,
        level = %config.log_level,
        "Starting reader"
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;
    let result = runtime.block_on(read(config, args));
    // Stdin reads park a blocking thread; do not wait on it.
    runtime.shutdown_timeout(Duration::from_millis(100));
    result
}

fn parse_args(args: impl Iterator<Item = String>) -> Result<CliArgs> {
    let mut config_path = PathBuf::from("conf/config.toml");
    let mut mode = None;
    let mut positional = Vec::new();
    let mut args = args;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args
                    .next()
                    .ok_or_else(|| anyhow!("--config needs a path\n{USAGE}"))?;
                config_path = PathBuf::from(path);
            }
            "--single" => mode = Some(ReadingMode::Single),
            "--continuous" => mode = Some(ReadingMode::Continuous),
            flag if flag.starts_with("--") => return Err(anyhow!("Unknown flag {flag}\n{USAGE}")),
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let novel_id = positional.next().ok_or_else(|| anyhow!(USAGE))?;
    let chapter_number = match positional.next() {
        Some(raw) => raw
            .parse::<u32>()
            .ok()
            .filter(|n| *n >= FIRST_CHAPTER_NUMBER)
            .ok_or_else(|| anyhow!("Invalid chapter number {raw}\n{USAGE}"))?,
        None => FIRST_CHAPTER_NUMBER,
    };
    if let Some(extra) = positional.next() {
        return Err(anyhow!("Unexpected argument {extra}\n{USAGE}"));
    }
    Ok(CliArgs {
        config_path,
        mode,
        novel_id,
        chapter_number,
    })
}

async fn read(config: AppConfig, args: CliArgs) -> Result<()> {
    let fetcher = HttpContentSource::new(&config.content_base_url, config.fetch_timeout())
        .context("Failed to set up the content source")?;
    let telemetry: Option<Arc<dyn TelemetrySink>> = if config.telemetry_enabled {
        match HttpTelemetrySink::new(&config.telemetry_url, config.fetch_timeout()) {
            Ok(sink) => Some(Arc::new(sink)),
            Err(err) => {
                warn!("Telemetry disabled: {err:#}");
                None
            }
        }
    } else {
        None
    };
    let trigger = Arc::new(ManualProximityTrigger::new());
    let handle = ReadingSessionController::spawn(
        SessionServices {
            fetcher: Arc::new(fetcher),
            trigger: trigger.clone(),
            telemetry,
        },
        SessionSettings::from(&config),
    );

    let interrupt = handle.clone();
    ctrlc::set_handler(move || {
        if let Err(err) = interrupt.close() {
            debug!("Ctrl-C after the session already stopped: {err}");
        }
    })
    .context("Failed to install the Ctrl-C handler")?;

    let printer = tokio::spawn(print_updates(handle.watch(), terminal_width()));
    let mode = args.mode.unwrap_or(config.reading_mode);
    handle.open_session(args.novel_id, args.chapter_number, mode)?;
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = handle.closed() => break,
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read from stdin")? else {
                    handle.close()?;
                    break;
                };
                if !dispatch(&handle, &trigger, &line)? {
                    break;
                }
            }
        }
    }

    handle.closed().await;
    printer.abort();
    Ok(())
}

const HELP: &str = "Commands: n(ext) p(rev) m(ore) mode single|continuous \
toc [page] [filter] go <chapter> retry hide show status help q(uit)";

#[derive(Debug, PartialEq)]
enum Command {
    Next,
    Previous,
    More,
    Mode(ReadingMode),
    Toc {
        page: Option<usize>,
        filter: Option<String>,
    },
    Go(u32),
    Retry,
    Visible(bool),
    Status,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(Command::Status);
    };
    let command = match verb {
        "n" | "next" => Command::Next,
        "p" | "prev" | "previous" => Command::Previous,
        "m" | "more" => Command::More,
        "mode" => match words.next() {
            Some("single") => Command::Mode(ReadingMode::Single),
            Some("continuous") => Command::Mode(ReadingMode::Continuous),
            _ => return Err("mode takes `single` or `continuous`".to_string()),
        },
        "toc" => {
            let rest: Vec<&str> = words.collect();
            let (page, filter) = match rest.split_first() {
                Some((first, tail)) => match first.parse::<usize>() {
                    Ok(page) => (Some(page), tail.join(" ")),
                    Err(_) => (None, rest.join(" ")),
                },
                None => (None, String::new()),
            };
            Command::Toc {
                page,
                filter: (!filter.is_empty()).then_some(filter),
            }
        }
        "go" => match words.next().and_then(|raw| raw.parse::<u32>().ok()) {
            Some(n) if n >= FIRST_CHAPTER_NUMBER => Command::Go(n),
            _ => return Err("go takes a chapter number".to_string()),
        },
        "retry" => Command::Retry,
        "hide" => Command::Visible(false),
        "show" => Command::Visible(true),
        "status" => Command::Status,
        "h" | "help" => Command::Help,
        "q" | "quit" | "exit" => Command::Quit,
        other => return Err(format!("unknown command `{other}`")),
    };
    Ok(command)
}

/// Run one stdin command. Returns `false` once the reader should exit.
fn dispatch(handle: &SessionHandle, trigger: &ManualProximityTrigger, line: &str) -> Result<bool> {
    let command = match parse_command(line) {
        Ok(command) => command,
        Err(message) => {
            println!("{message}. {HELP}");
            return Ok(true);
        }
    };
    match command {
        Command::Next => handle.advance(Direction::Next)?,
        Command::Previous => handle.advance(Direction::Previous)?,
        Command::More => {
            if trigger.request_more() == 0 {
                println!("Nothing to load; switch to continuous mode first.");
            }
        }
        Command::Mode(mode) => handle.switch_mode(mode)?,
        Command::Toc { page, filter } => {
            let snapshot = handle.snapshot();
            let page = match (page, &filter, snapshot.cursor.as_ref()) {
                (Some(page), _, _) => handle.toc_page(page, None, filter.as_deref()),
                (None, None, Some(cursor)) => handle
                    .toc_page_for(cursor.chapter_number)
                    .or_else(|| handle.toc_page(1, None, None)),
                (None, _, _) => handle.toc_page(1, None, filter.as_deref()),
            };
            match page {
                Some(page) => print!("{}", render_toc_page(&page)),
                None => println!("No contents to show."),
            }
        }
        Command::Go(chapter_number) => handle.select_toc_entry(chapter_number)?,
        Command::Retry => handle.retry()?,
        Command::Visible(visible) => handle.set_visible(visible)?,
        Command::Status => println!("{}", render_status(&handle.snapshot())),
        Command::Help => println!("{HELP}"),
        Command::Quit => {
            handle.close()?;
            return Ok(false);
        }
    }
    Ok(true)
}

/// What has already been written to the terminal for the current generation.
#[derive(Debug, Default)]
struct Printed {
    generation: u64,
    chapters: usize,
    failure_shown: bool,
    end_shown: bool,
    last_error: Option<String>,
}

impl Printed {
    fn update(&mut self, snapshot: &SessionSnapshot, width: usize) -> Vec<String> {
        if snapshot.generation != self.generation {
            *self = Printed {
                generation: snapshot.generation,
                ..Printed::default()
            };
        }
        let mut out = Vec::new();
        if snapshot.chapters.len() > self.chapters {
            out.extend(
                snapshot.chapters[self.chapters..]
                    .iter()
                    .map(|chapter| render_chapter(chapter, width)),
            );
            self.chapters = snapshot.chapters.len();
        }
        if let LoadStatus::Failed { message } = &snapshot.status
            && !self.failure_shown
        {
            out.push(format!("{message} (type `retry` to try again)"));
            self.failure_shown = true;
        }
        if snapshot.status == LoadStatus::Ready
            && snapshot.last_error.is_some()
            && snapshot.last_error != self.last_error
        {
            out.push("Could not load the next chapter; type `more` to try again.".to_string());
        }
        self.last_error = snapshot.last_error.clone();
        if snapshot.end_of_archive && !self.end_shown {
            out.push("-- End of archive --".to_string());
            self.end_shown = true;
        }
        out
    }
}

async fn print_updates(mut updates: watch::Receiver<SessionSnapshot>, width: usize) {
    let mut printed = Printed::default();
    while updates.changed().await.is_ok() {
        let snapshot = updates.borrow_and_update().clone();
        for block in printed.update(&snapshot, width) {
            println!("{block}");
        }
    }
}

fn terminal_width() -> usize {
    env::var("COLUMNS")
        .ok()
        .and_then(|raw| raw.parse::<usize>().ok())
        .unwrap_or(80)
}

fn init_tracing() -> ReloadHandle {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter_layer, handle) = reload::Layer::new(env_filter);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_filter(filter_layer),
        )
        .init();
    handle
}

fn set_log_level(handle: &ReloadHandle, level: &str) {
    if env::var_os("RUST_LOG").is_some() {
        info!("RUST_LOG is set; ignoring configured log level");
        return;
    }
    let parsed = EnvFilter::builder()
        .parse(level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(err) = handle.modify(|filter| *filter = parsed) {
        warn!(%level, "Failed to update log level from config: {err}");
    } else {
        info!(%level, "Applied log level from config");
    }
}
