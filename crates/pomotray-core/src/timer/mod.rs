mod controller;
mod effect;
mod machine;
mod session;
mod state;

pub use controller::{Clock, ControllerBuilder, FixedClock, Frame, SystemClock, TimerController, TrayHost};
pub use effect::{Effect, Outcome, Sound, Tick};
pub use machine::{MachineConfig, TimerMachine};
pub use session::TimerSession;
pub use state::{StateStyle, StateStyles, TimerState};
