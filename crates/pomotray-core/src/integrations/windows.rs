//! Window hiding on X11 through `wmctrl` and `xdotool`.

use std::process::Command;
use std::sync::Mutex;
use tracing::{debug, warn};

use super::traits::WindowGateway;
use crate::error::GatewayError;

#[derive(Default)]
pub struct WmctrlWindows {
    /// Windows minimized by the last call, restored in order.
    minimized: Mutex<Vec<String>>,
}

impl WmctrlWindows {
    pub fn new() -> Self {
        Self::default()
    }

    fn run(program: &str, args: &[&str]) -> Result<String, GatewayError> {
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| GatewayError::Command {
                program: program.to_string(),
                message: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(GatewayError::Command {
                program: program.to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Window ids from `wmctrl -l`, skipping sticky windows (desktop -1:
/// panels, docks, the desktop itself).
pub fn parse_window_list(listing: &str) -> Vec<String> {
    listing
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let id = fields.next()?;
            let desktop = fields.next()?;
            (desktop != "-1").then(|| id.to_string())
        })
        .collect()
}

impl WindowGateway for WmctrlWindows {
    fn minimize_open_windows(&self) -> Result<usize, GatewayError> {
        let ids = parse_window_list(&Self::run("wmctrl", &["-l"])?);
        let mut done = Vec::with_capacity(ids.len());
        for id in ids {
            match Self::run("xdotool", &["windowminimize", &id]) {
                Ok(_) => done.push(id),
                Err(e) => warn!(%id, error = %e, "could not minimize window"),
            }
        }
        debug!(count = done.len(), "windows minimized");
        let count = done.len();
        *self.minimized.lock().unwrap_or_else(|p| p.into_inner()) = done;
        Ok(count)
    }

    fn restore_windows(&self) -> Result<usize, GatewayError> {
        let ids = std::mem::take(&mut *self.minimized.lock().unwrap_or_else(|p| p.into_inner()));
        let mut restored = 0;
        for id in ids.iter().rev() {
            match Self::run("wmctrl", &["-i", "-a", id]) {
                Ok(_) => restored += 1,
                Err(e) => warn!(%id, error = %e, "could not restore window"),
            }
        }
        Ok(restored)
    }
}
