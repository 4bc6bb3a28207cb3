//! `pomotray run`: drive the timer from stdin, print frames and events as
//! JSON lines on stdout.

use clap::Args;
use pomotray_core::integrations::{self, Gateways};
use pomotray_core::storage::open_store;
use pomotray_core::{
    Clock, Config, Event, Feature, Frame, HttpExecutor, MachineConfig, MemoryStore, MenuCommand,
    PersistenceStore, SystemClock, TimerController, TimerKind, TimerMachine, TrayHost,
};
use serde_json::json;
use std::io::{BufRead, Write};
use std::sync::Arc;
use tracing::warn;

#[derive(Args)]
pub struct RunArgs {
    /// Keep everything in memory and skip external services
    #[arg(long)]
    offline: bool,
}

/// Tray host that writes one JSON object per line.
struct ConsoleHost;

impl ConsoleHost {
    fn emit(&self, value: serde_json::Value) {
        let mut out = std::io::stdout().lock();
        if let Err(e) = writeln!(out, "{value}").and_then(|()| out.flush()) {
            warn!(error = %e, "cannot write to stdout");
        }
    }
}

impl TrayHost for ConsoleHost {
    fn present(&self, frame: Frame) {
        self.emit(json!({ "frame": frame }));
    }

    fn notify(&self, event: &Event) {
        self.emit(json!({ "event": event }));
    }
}

/// One line of stdin input.
#[derive(Debug, PartialEq)]
enum Input {
    Command(MenuCommand),
    Menu,
    Status,
}

fn parse_input(line: &str, step_size: u32) -> Result<Input, String> {
    let step = i32::try_from(step_size).unwrap_or(i32::MAX);
    let mut words = line.split_whitespace();
    let verb = words.next().unwrap_or_default();
    let input = match verb {
        "start" => Input::Command(MenuCommand::Start),
        "stop" => Input::Command(MenuCommand::Stop),
        "exit" | "quit" => Input::Command(MenuCommand::Exit),
        "work+" => adjust(TimerKind::Work, step),
        "work-" => adjust(TimerKind::Work, -step),
        "pause+" => adjust(TimerKind::Pause, step),
        "pause-" => adjust(TimerKind::Pause, -step),
        "toggle" => {
            let name = words.collect::<Vec<_>>().join(" ");
            if name.is_empty() {
                return Err("toggle needs a feature name".into());
            }
            let feature = name.parse::<Feature>()?;
            Input::Command(MenuCommand::Toggle { feature })
        }
        "menu" => Input::Menu,
        "status" => Input::Status,
        other => return Err(format!("unknown command: {other}")),
    };
    Ok(input)
}

fn adjust(kind: TimerKind, delta: i32) -> Input {
    Input::Command(MenuCommand::Adjust { kind, delta })
}

fn open_gateways(
    config: &Config,
    http: &HttpExecutor,
    offline: bool,
) -> (Arc<dyn PersistenceStore>, Gateways) {
    if offline {
        let store: Arc<dyn PersistenceStore> = Arc::new(MemoryStore::new());
        return (store.clone(), Gateways::new().with_store(store));
    }
    let store = match open_store(config.store.backend, http) {
        Ok(store) => store,
        Err(e) => {
            warn!(error = %e, "can't open store, counters will not persist");
            Arc::new(MemoryStore::new())
        }
    };
    let gateways = integrations::connect(config, store.clone(), http);
    (store, gateways)
}

pub fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let http = HttpExecutor::new()?;
    let (store, gateways) = open_gateways(&config, &http, args.offline);

    let machine = TimerMachine::new(
        MachineConfig::from_config(&config),
        config.default_settings.clone(),
        SystemClock.today(),
    );
    let host = Arc::new(ConsoleHost);
    let controller = TimerController::builder(machine, Arc::new(gateways), host.clone())
        .countdown(config.countdown)
        .build();
    controller.initialize(store.as_ref());

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let step_size = controller.settings().step_size;
        match parse_input(&line, step_size) {
            Ok(Input::Command(MenuCommand::Exit)) => break,
            Ok(Input::Command(command)) => {
                if let Err(e) = controller.dispatch(command) {
                    host.emit(json!({ "error": e.to_string() }));
                }
            }
            Ok(Input::Menu) => host.emit(json!({ "menu": controller.frame().menu })),
            Ok(Input::Status) => host.emit(json!({ "session": controller.session() })),
            Err(e) => host.emit(json!({ "error": e })),
        }
    }

    controller.exit();
    Ok(())
}
