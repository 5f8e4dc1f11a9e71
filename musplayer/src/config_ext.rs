//! Extension pour intégrer la configuration du lecteur dans musconfig

use anyhow::Result;
use musconfig::Config;
use serde_yaml::{Number, Value};
use std::time::Duration;

/// Volume initial quand la configuration n'en donne pas
pub const DEFAULT_VOLUME: u8 = 50;

/// Période du sondage de progression de secours
pub const DEFAULT_PROGRESS_POLL: Duration = Duration::from_millis(1000);

/// Trait d'extension pour la configuration du lecteur (`player.*`)
pub trait PlayerConfigExt {
    /// Période du sondage de progression (`player.progress_poll_ms`)
    fn get_player_progress_poll(&self) -> Result<Duration>;

    /// Volume initial, borné à 0..=100 (`player.default_volume`)
    fn get_player_default_volume(&self) -> Result<u8>;

    fn set_player_default_volume(&self, volume: u8) -> Result<()>;
}

impl PlayerConfigExt for Config {
    fn get_player_progress_poll(&self) -> Result<Duration> {
        let ms = self.get_u64_or(
            &["player", "progress_poll_ms"],
            DEFAULT_PROGRESS_POLL.as_millis() as u64,
        );
        Ok(Duration::from_millis(ms.max(1)))
    }

    fn get_player_default_volume(&self) -> Result<u8> {
        let volume = self.get_u64_or(&["player", "default_volume"], DEFAULT_VOLUME as u64);
        Ok(volume.min(100) as u8)
    }

    fn set_player_default_volume(&self, volume: u8) -> Result<()> {
        self.set_value(
            &["player", "default_volume"],
            Value::Number(Number::from(volume.min(100))),
        )
    }
}
