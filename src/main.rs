use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{DisableBracketedPaste, EnableBracketedPaste},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use log::{info, warn};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    time::Duration,
};

use vetted::{
    api::HttpSessionApi,
    app::App,
    app_dirs::AppDirs,
    capture::AnswerCapture,
    config::{ConfigOverrides, ConfigStore, FileConfigStore},
    controller::{SessionController, PULSE_INTERVAL},
    dictation::{CommandDictation, DictationEngine, NoDictation},
    logging,
    model::SessionId,
    runtime::{self, CrosstermEventSource, FixedTicker, Runner},
};

const TICK_RATE_MS: u64 = 100;

/// take a timed interview session from the terminal
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Answer the questions of an assigned interview session one at a time, each against its own countdown. Typed or dictated answers are submitted together once the last question is done."
)]
pub struct Cli {
    /// id of the interview session to take
    session_id: String,

    /// base url of the interview backend
    #[clap(long)]
    api_url: Option<String>,

    /// bearer token sent with every request (never saved)
    #[clap(long, env = "VETTED_API_TOKEN")]
    api_token: Option<String>,

    /// external speech recognizer; prints one finalized phrase per line
    #[clap(long)]
    dictation_command: Option<String>,

    /// language tag handed to the recognizer, e.g. en-US
    #[clap(short = 'l', long)]
    language: Option<String>,

    /// seconds before a backend request is abandoned
    #[clap(long)]
    timeout_secs: Option<u64>,
}

impl Cli {
    fn to_overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            api_url: self.api_url.clone(),
            api_token: self.api_token.clone(),
            dictation_command: self.dictation_command.clone(),
            language: self.language.clone(),
            request_timeout_secs: self.timeout_secs,
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    if let Err(e) = logging::init(&AppDirs::log_path()) {
        eprintln!("logging disabled: {}", e);
    }

    let store = FileConfigStore::new();
    let config = store.load().merged(cli.to_overrides());
    if let Err(e) = config.validate() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::InvalidValue, e.to_string()).exit();
    }
    if let Err(e) = store.save(&config) {
        warn!("could not save config to {}: {}", store.path().display(), e);
    }

    let api = HttpSessionApi::new(
        &config.api_url,
        config.api_token.clone(),
        config.request_timeout(),
    )?;
    let engine: Box<dyn DictationEngine> = match config
        .dictation_command
        .as_deref()
        .and_then(CommandDictation::from_command_line)
    {
        Some(cmd) => Box::new(cmd),
        None => Box::new(NoDictation),
    };

    let events = CrosstermEventSource::new();
    let mut capture = AnswerCapture::new(engine, config.language.clone());
    capture.set_dictation_sink(runtime::dictation_sink(events.sender()));
    let controller = SessionController::new(api, SessionId(cli.session_id.clone()), capture)
        .with_pulses(PULSE_INTERVAL, runtime::pulse_emitter(events.sender()));
    let mut app = App::new(controller).with_languages(config.language_cycle());
    info!("opening session {} against {}", cli.session_id, config.api_url);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let runner = Runner::new(events, FixedTicker::new(Duration::from_millis(TICK_RATE_MS)));
    let result = start_tui(&mut terminal, &mut app, &runner);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableBracketedPaste,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App<HttpSessionApi>,
    runner: &Runner<CrosstermEventSource, FixedTicker>,
) -> Result<(), Box<dyn Error>> {
    // Load after the first frame so the loading screen is visible during the request.
    terminal.draw(|f| f.render_widget(&*app, f.area()))?;
    if let Err(e) = app.controller.load_session_details() {
        app.flash = Some(e.to_string());
    }

    while !app.should_quit {
        terminal.draw(|f| f.render_widget(&*app, f.area()))?;
        let event = runner.step();
        app.handle_event(event);
    }

    info!("leaving session {} in {}", app.controller.session_id(), app.phase());
    Ok(())
}
