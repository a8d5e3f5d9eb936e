use std::sync::Arc;

use game_core::{GameEvent, GiftId};
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Celebration {
    Reveal,
    Locked,
}

#[derive(Debug, thiserror::Error)]
pub enum EffectError {
    #[error("effect unavailable: {0}")]
    Unavailable(String),
}

/// Audio cue plus visual flourish. Must return without waiting for the
/// effect to finish.
pub trait EffectPort: Send + Sync {
    fn celebrate(&self, celebration: Celebration, gift_id: &GiftId) -> Result<(), EffectError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogEffects;

impl EffectPort for LogEffects {
    fn celebrate(&self, celebration: Celebration, gift_id: &GiftId) -> Result<(), EffectError> {
        info!(target: "effects", ?celebration, gift_id = %gift_id, "celebration");
        Ok(())
    }
}

#[derive(Clone)]
pub struct EffectTrigger {
    port: Arc<dyn EffectPort>,
}

impl EffectTrigger {
    pub fn new(port: Arc<dyn EffectPort>) -> Self {
        Self { port }
    }

    /// Fires one effect per reveal or lock. Returns how many were attempted.
    pub fn dispatch(&self, events: &[GameEvent]) -> usize {
        let mut fired = 0;
        for event in events {
            let (celebration, gift_id) = match event {
                GameEvent::GiftRevealed { gift_id, .. } => (Celebration::Reveal, gift_id),
                GameEvent::GiftLocked { gift_id } => (Celebration::Locked, gift_id),
                _ => continue,
            };
            fired += 1;
            if let Err(err) = self.port.celebrate(celebration, gift_id) {
                debug!(target: "effects", %err, "effect skipped");
            }
        }
        fired
    }
}
