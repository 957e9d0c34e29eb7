//! Terminal front end
//!
//! Reads one instruction per line from stdin and prints notices and state
//! changes to stdout. Control names come from the shared binding tables, so
//! the console offers exactly the controls any other front end does.

use async_trait::async_trait;
use laserdeck_communication::{
    control_for_id, jog_vector_for_id, Confirmer, ConnectionState, ControlPanel, PrintRequest,
    UiEvent, UploadState, CONTROL_BINDINGS, JOG_BINDINGS, STEP_SIZES,
};
use laserdeck_core::{
    AppEvent, ConnectionEvent, Error, EventBus, MachineState, NoticeLevel, PageAction,
    UploadError, UploadEvent,
};
use laserdeck_settings::ClientSettings;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::{broadcast, Mutex};

use crate::app::Session;

type SharedLines = Arc<Mutex<Lines<BufReader<Stdin>>>>;

/// One parsed console line
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// Something that maps to a controller command
    Ui(UiEvent),
    /// Upload a local file (`None` when no path was given)
    Upload(Option<PathBuf>),
    /// Cancel the running upload
    CancelUpload,
    /// Print the mirrored state
    Status,
    /// List job files on the controller
    Files,
    /// Print the instruction list
    Help,
    /// Leave the console
    Quit,
    /// Blank line
    Empty,
    /// Unrecognised or malformed instruction, with a hint
    Invalid(String),
}

/// Parse one console line
pub fn parse_line(line: &str) -> Input {
    let mut words = line.split_whitespace();
    let Some(word) = words.next() else {
        return Input::Empty;
    };
    let args: Vec<&str> = words.collect();

    if let Some(control) = control_for_id(word) {
        return Input::Ui(UiEvent::Control(control));
    }
    if let Some(vector) = jog_vector_for_id(word) {
        return Input::Ui(UiEvent::Jog { vector });
    }

    match word.to_ascii_lowercase().as_str() {
        "step" => match args.first().and_then(|s| s.parse::<f64>().ok()) {
            Some(step) => Input::Ui(UiEvent::SelectStep(step)),
            None => Input::Invalid(format!("usage: step <{}>", step_list())),
        },
        "print" => parse_print(&args),
        "delete" => match args.first() {
            Some(file) => Input::Ui(UiEvent::DeleteFile(file.to_string())),
            None => Input::Invalid("usage: delete <file>".to_string()),
        },
        "wifi" => match args.as_slice() {
            [ssid, password] => Input::Ui(UiEvent::ChangeWifi {
                ssid: ssid.to_string(),
                password: password.to_string(),
            }),
            _ => Input::Invalid("usage: wifi <ssid> <password>".to_string()),
        },
        "upload" => Input::Upload(args.first().map(PathBuf::from)),
        "cancel" => Input::CancelUpload,
        "status" => Input::Status,
        "files" => Input::Files,
        "help" | "?" => Input::Help,
        "quit" | "exit" => Input::Quit,
        other => Input::Invalid(format!("unknown instruction '{}', try help", other)),
    }
}

fn parse_print(args: &[&str]) -> Input {
    const USAGE: &str = "usage: print <file> <laser power> <exposures per line> [single]";
    let (file, power, exposure, rest) = match args {
        [file, power, exposure, rest @ ..] => (file, power, exposure, rest),
        _ => return Input::Invalid(USAGE.to_string()),
    };
    let (Ok(laser_power), Ok(exposure_per_line)) = (power.parse::<u32>(), exposure.parse::<u32>()) else {
        return Input::Invalid(USAGE.to_string());
    };
    Input::Ui(UiEvent::StartPrint(PrintRequest {
        file: file.to_string(),
        laser_power,
        exposure_per_line,
        single_facet: rest.first().is_some_and(|flag| flag.eq_ignore_ascii_case("single")),
    }))
}

fn step_list() -> String {
    STEP_SIZES
        .iter()
        .map(|step| step.to_string())
        .collect::<Vec<_>>()
        .join("|")
}

fn help_text() -> String {
    let controls: Vec<&str> = CONTROL_BINDINGS.iter().map(|(id, _)| *id).collect();
    let jogs: Vec<&str> = JOG_BINDINGS.iter().map(|(id, _)| *id).collect();
    format!(
        "controls: {}\njog:      {}\n          step <{}>\njobs:     print <file> <power> <exposures> [single] | delete <file> | files\nupload:   upload <path> | cancel\nother:    wifi <ssid> <password> | status | help | quit",
        controls.join(" "),
        jogs.join(" "),
        step_list()
    )
}

/// One-line summary of the mirrored state
pub fn status_line(state: &MachineState, connection: ConnectionState, upload: &UploadState) -> String {
    let activity = match (state.printing, state.paused) {
        (true, true) => format!("paused {}", state.job.filename),
        (true, false) => format!(
            "printing {} {}% ({}/{}) {}s",
            state.job.filename,
            state.job.progress_percent(),
            state.job.current_line,
            state.job.total_lines,
            state.job.elapsed_seconds
        ),
        _ => "idle".to_string(),
    };
    format!(
        "[{}] {} | laser {} | prism {} | diode test {} | upload {}",
        connection,
        activity,
        on_off(state.components.laser),
        on_off(state.components.rotating),
        state.components.diode_test,
        upload
    )
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

/// Confirmer asking on the console
pub struct ConsoleConfirmer {
    lines: SharedLines,
}

#[async_trait]
impl Confirmer for ConsoleConfirmer {
    async fn confirm(&self, prompt: &str) -> bool {
        println!("{} [y/N]", prompt);
        let answer = self.lines.lock().await.next_line().await;
        match answer {
            Ok(Some(answer)) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            _ => false,
        }
    }
}

/// Follows the connection events and reports only changes in reachability
#[derive(Debug, Default)]
struct Reachability {
    reachable: Option<bool>,
}

impl Reachability {
    fn observe(&mut self, event: &ConnectionEvent) -> Option<String> {
        let (reachable, message) = match event {
            ConnectionEvent::Connected { .. } => (true, "controller connected".to_string()),
            ConnectionEvent::Disconnected { reason } => {
                (false, format!("controller connection lost: {}", reason))
            }
            _ => return None,
        };
        if self.reachable == Some(reachable) {
            return None;
        }
        self.reachable = Some(reachable);
        Some(message)
    }
}

fn print_event(event: &AppEvent, reachability: &mut Reachability) {
    match event {
        AppEvent::Notice(notice) => match notice.level {
            NoticeLevel::Info => println!("{}", notice.message),
            level => println!("[{}] {}", level, notice.message),
        },
        AppEvent::Connection(event) => {
            if let Some(message) = reachability.observe(event) {
                println!("{}", message);
            }
        }
        AppEvent::Upload(UploadEvent::Completed { filename }) => println!("uploaded {}", filename),
        _ => {}
    }
}

fn print_files(session: &Session) {
    let files = session.store().files();
    if files.is_empty() {
        println!("no job files on the controller");
    } else {
        for file in files {
            println!("  {}", file);
        }
    }
}

fn follow_page_action(session: &Arc<Session>, action: PageAction) {
    match action {
        PageAction::Refresh => print_files(session),
        PageAction::ReloadAfter { delay_ms } => {
            let session = session.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                session.reload();
            });
        }
        PageAction::RedirectAfter { url, delay_ms } => {
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                println!("remote shell: {}", url);
            });
        }
    }
}

async fn watch_events(session: Arc<Session>, bus: Arc<EventBus>) {
    let mut events = bus.receiver();
    let mut reachability = Reachability::default();
    loop {
        match events.recv().await {
            Ok(AppEvent::Page(action)) => follow_page_action(&session, action),
            Ok(event) => print_event(&event, &mut reachability),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!("Console skipped {} events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Run the console until `quit` or end of input
pub async fn run(settings: ClientSettings) -> anyhow::Result<()> {
    let lines: SharedLines = Arc::new(Mutex::new(BufReader::new(tokio::io::stdin()).lines()));
    let confirmer = Arc::new(ConsoleConfirmer {
        lines: lines.clone(),
    });
    let session = Arc::new(Session::new(settings, confirmer)?);
    let watcher = tokio::spawn(watch_events(session.clone(), session.bus().clone()));

    println!(
        "LaserDeck {} - controller {} (help for instructions)",
        crate::VERSION,
        session.settings().connection.base_url
    );
    session.start();

    let mut panel = ControlPanel::new();
    loop {
        let line = lines.lock().await.next_line().await?;
        let Some(line) = line else {
            break;
        };

        match parse_line(&line) {
            Input::Ui(event) => {
                if panel.observe(&event) {
                    println!("step {} mm", panel.step());
                    continue;
                }
                // failures are already reported as notices
                if let Err(e) = session.dispatcher().send_event(&event, &panel).await {
                    tracing::debug!("Console command failed: {}", e);
                }
            }
            Input::Upload(path) => {
                // transfer outcomes arrive as notices
                if let Err(Error::Upload(e @ UploadError::Source { .. })) =
                    session.upload_file(path.as_deref()).await
                {
                    println!("[error] {}", e);
                }
            }
            Input::CancelUpload => {
                if !session.uploads().cancel() {
                    println!("no upload in progress");
                }
            }
            Input::Status => println!(
                "{}",
                status_line(
                    &session.store().snapshot(),
                    session.channel().connection_state(),
                    &session.uploads().state()
                )
            ),
            Input::Files => print_files(&session),
            Input::Help => println!("{}", help_text()),
            Input::Quit => break,
            Input::Empty => {}
            Input::Invalid(hint) => println!("{}", hint),
        }
    }

    session.shutdown();
    watcher.abort();
    Ok(())
}
