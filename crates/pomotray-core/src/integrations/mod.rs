pub mod effects;
pub mod home_assistant;
pub mod http;
pub mod playback;
pub mod sound;
pub mod spotify;
pub mod ticktick;
pub mod traits;
pub mod windows;

pub use effects::{EffectsGateway, Gateways};
pub use home_assistant::HomeAssistantWebhook;
pub use http::HttpExecutor;
pub use playback::PlaybackDispatcher;
pub use sound::CommandSoundPlayer;
pub use spotify::SpotifyPlayback;
pub use ticktick::TickTickHabits;
pub use traits::{HabitGateway, PlaybackGateway, SoundGateway, WebhookGateway, WindowGateway};
pub use windows::WmctrlWindows;

use std::sync::Arc;
use tracing::{info, warn};

use crate::secrets::{self, SpotifyCredentials};
use crate::storage::{Config, PersistenceStore};

/// Wire every gateway whose secrets are present.
///
/// Unavailable services are logged and left out; the timer runs without
/// their effects.
pub fn connect(
    config: &Config,
    store: Arc<dyn PersistenceStore>,
    http: &HttpExecutor,
) -> Gateways {
    let mut gateways = Gateways::new()
        .with_store(store)
        .with_webhook(Arc::new(HomeAssistantWebhook::new(http.clone())))
        .with_windows(Arc::new(WmctrlWindows::new()))
        .with_sound(Arc::new(CommandSoundPlayer::new(&config.sounds)));

    let spotify = SpotifyCredentials::from_env().and_then(|credentials| {
        SpotifyPlayback::connect(
            &config.media.spotify_api_base,
            &config.media.spotify_accounts_base,
            credentials,
            http.clone(),
        )
    });
    gateways = match spotify {
        Ok(playback) => match PlaybackDispatcher::new(Arc::new(playback)) {
            Ok(dispatcher) => gateways.with_playback(dispatcher),
            Err(e) => {
                warn!(error = %e, "can't start playback worker, Spotify disabled");
                gateways
            }
        },
        Err(e) => {
            warn!(error = %e, "can't connect to Spotify, feature disabled");
            gateways
        }
    };

    match secrets::required(secrets::TICKTICK_COOKIE)
        .and_then(|cookie| TickTickHabits::new(&config.habit.api_base, cookie, http.clone()))
    {
        Ok(habits) => {
            info!(habit = %config.habit.name, "habit tracking enabled");
            gateways.with_habits(Arc::new(habits))
        }
        Err(e) => {
            warn!(error = %e, "habit tracking disabled");
            gateways
        }
    }
}
