use crate::error::GatewayError;
use crate::timer::Sound;

/// Music playback on a remote player.
pub trait PlaybackGateway: Send + Sync {
    /// Start `uri` (a playlist/context URI) from the beginning.
    fn play_playlist(&self, uri: &str) -> Result<(), GatewayError>;

    /// Pause whatever is playing. A no-op when nothing is.
    fn pause_playback(&self) -> Result<(), GatewayError>;

    fn currently_playing(&self) -> Result<bool, GatewayError>;

    /// Empty or absent `uri` means "pause".
    fn switch_to(&self, uri: Option<&str>) -> Result<(), GatewayError> {
        match uri.map(str::trim).filter(|u| !u.is_empty()) {
            Some(uri) => self.play_playlist(uri),
            None => self.pause_playback(),
        }
    }
}

/// Fire-and-forget home-automation webhook.
pub trait WebhookGateway: Send + Sync {
    fn trigger(&self, url: &str);
}

pub trait WindowGateway: Send + Sync {
    /// Minimize all normal windows; returns how many were minimized.
    fn minimize_open_windows(&self) -> Result<usize, GatewayError>;

    /// Bring back the windows minimized last time.
    fn restore_windows(&self) -> Result<usize, GatewayError>;
}

pub trait HabitGateway: Send + Sync {
    /// `date_stamp` is `YYYYMMDD`; `value` 2 marks the habit as completed.
    fn check_in(&self, habit: &str, date_stamp: &str, value: u32) -> Result<(), GatewayError>;
}

pub trait SoundGateway: Send + Sync {
    /// Start playing without waiting for the end.
    fn play(&self, sound: Sound, volume: u32) -> Result<(), GatewayError>;
}
