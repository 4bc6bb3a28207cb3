//! # Pomotray Core Library
//!
//! Core logic of the Pomotray tray timer. A single work/pause state
//! machine counts down in whole minutes, keeps a daily work-time counter
//! and, on each transition, asks external services to play a sound,
//! switch playlists, fire Home Assistant webhooks, hide windows or check
//! in a habit.
//!
//! ## Architecture
//!
//! - **Timer**: [`TimerMachine`] is pure and returns effects;
//!   [`TimerController`] drives it from a countdown thread and presents
//!   frames to a [`TrayHost`]
//! - **Storage**: a JSON document store (Firebase, SQLite or in-memory)
//!   for settings and counters, and TOML-based configuration
//! - **Integrations**: Spotify, Home Assistant, TickTick, window and sound
//!   gateways behind small traits
//! - **Menu/Icon**: a host-independent menu model and RGBA icons
//!
//! ## Key Components
//!
//! - [`TimerMachine`]: state machine
//! - [`TimerController`]: countdown worker and effect dispatch
//! - [`Config`]: application configuration management
//! - [`PersistenceStore`]: settings and counter persistence

pub mod error;
pub mod events;
pub mod icon;
pub mod integrations;
pub mod menu;
pub mod secrets;
pub mod settings;
pub mod storage;
pub mod timer;

pub use error::{ConfigError, CoreError, GatewayError, StoreError, ValidationError};
pub use events::Event;
pub use icon::{IconImage, IconRenderer, PixelIconRenderer};
pub use integrations::{EffectsGateway, Gateways, HttpExecutor};
pub use menu::{build_menu, MenuCommand, MenuEntry, MenuItem, MenuView};
pub use settings::{Feature, Settings, StoreRefs, TimerKind};
pub use storage::{Config, LocalStore, MemoryStore, PersistenceStore};
pub use timer::{
    Clock, Effect, FixedClock, Frame, MachineConfig, Outcome, Sound, SystemClock, TimerController,
    TimerMachine, TimerSession, TimerState, TrayHost,
};
