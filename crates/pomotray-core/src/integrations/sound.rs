//! Transition sounds played through the platform's command-line player.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::{debug, warn};

use super::traits::SoundGateway;
use crate::error::GatewayError;
use crate::storage::SoundConfig;
use crate::timer::Sound;

pub struct CommandSoundPlayer {
    start: Option<PathBuf>,
    pause: Option<PathBuf>,
    player: String,
}

fn default_player() -> &'static str {
    if cfg!(target_os = "macos") {
        "afplay"
    } else {
        "paplay"
    }
}

impl CommandSoundPlayer {
    pub fn new(config: &SoundConfig) -> Self {
        Self {
            start: config.start.as_ref().map(PathBuf::from),
            pause: config.pause.as_ref().map(PathBuf::from),
            player: config
                .player
                .clone()
                .unwrap_or_else(|| default_player().to_string()),
        }
    }

    fn asset(&self, sound: Sound) -> Option<&PathBuf> {
        match sound {
            Sound::Start => self.start.as_ref(),
            Sound::Pause => self.pause.as_ref(),
        }
    }
}

/// Arguments for `player`, with `volume` in percent.
pub fn player_args(player: &str, path: &str, volume: u32) -> Vec<String> {
    let volume = volume.min(100);
    let program = player.rsplit('/').next().unwrap_or(player);
    match program {
        // PulseAudio volume: 65536 is 100 %.
        "paplay" => vec![format!("--volume={}", volume * 65536 / 100), path.to_string()],
        "afplay" => vec!["-v".into(), format!("{:.2}", f64::from(volume) / 100.0), path.to_string()],
        _ => vec![path.to_string()],
    }
}

impl SoundGateway for CommandSoundPlayer {
    fn play(&self, sound: Sound, volume: u32) -> Result<(), GatewayError> {
        let Some(path) = self.asset(sound) else {
            debug!(?sound, "no sound configured");
            return Ok(());
        };
        if !path.exists() {
            warn!(path = %path.display(), "sound file missing");
            return Ok(());
        }
        let path = path.to_string_lossy();
        let mut child = Command::new(&self.player)
            .args(player_args(&self.player, &path, volume))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| GatewayError::Command {
                program: self.player.clone(),
                message: e.to_string(),
            })?;
        // Reap in the background so the player never becomes a zombie.
        std::thread::spawn(move || child.wait());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paplay_volume_is_scaled() {
        assert_eq!(
            player_args("paplay", "/s/start.wav", 50),
            vec!["--volume=32768", "/s/start.wav"]
        );
        assert_eq!(
            player_args("/usr/bin/paplay", "a.wav", 250),
            vec!["--volume=65536", "a.wav"]
        );
    }

    #[test]
    fn afplay_volume_is_fraction() {
        assert_eq!(player_args("afplay", "a.wav", 70), vec!["-v", "0.70", "a.wav"]);
    }

    #[test]
    fn unconfigured_sound_is_skipped() {
        let player = CommandSoundPlayer::new(&SoundConfig {
            start: None,
            pause: Some("/definitely/not/here.wav".into()),
            player: Some("true".into()),
        });
        assert!(player.play(Sound::Start, 50).is_ok());
        assert!(player.play(Sound::Pause, 50).is_ok());
    }
}
