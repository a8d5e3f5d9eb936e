use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod events;
pub mod summary;
pub mod view;

pub use events::{derive_events, GameEvent};
pub use summary::{project_summary, SummaryRow, SummaryStats, SummaryView};
pub use view::{
    lookup_participant, project_host, project_spectator, swap_mode_active, FilterBucket,
    GiftCardView, GiftFilter, GiftMode, HostSelection, HostView, LookupOutcome, ParticipantCard,
    SpectatorSelection, SpectatorView,
};

pub type ParticipantId = String;
pub type GiftId = String;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    #[serde(default, alias = "photoUrl")]
    pub avatar_url: Option<String>,
    #[serde(default, alias = "category")]
    pub country: Option<String>,
    #[serde(default)]
    pub current_gift_id: Option<GiftId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Gift {
    pub id: GiftId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub original_owner_participant_id: Option<ParticipantId>,
    /// Current holder. Older servers call this `ownerParticipantId`.
    #[serde(default, alias = "ownerParticipantId")]
    pub winner_participant_id: Option<ParticipantId>,
    #[serde(default)]
    pub revealed: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub times_stolen: u32,
    #[serde(default, alias = "category")]
    pub country: Option<String>,
}

impl Gift {
    pub fn primary_image(&self) -> Option<&str> {
        self.image_urls
            .first()
            .or(self.image_url.as_ref())
            .map(String::as_str)
    }
}

/// One complete picture of the game as served by `GET /game/state`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub gifts: Vec<Gift>,
    #[serde(default)]
    pub upcoming_turn_order: Vec<ParticipantId>,
    #[serde(default)]
    pub completed_turn_order: Vec<ParticipantId>,
    #[serde(default)]
    pub current_participant_id: Option<ParticipantId>,
    #[serde(default)]
    pub game_started: bool,
    #[serde(default)]
    pub game_completed: bool,
    #[serde(default)]
    pub final_swap_available: bool,
    #[serde(default)]
    pub final_swap_used: bool,
    #[serde(default)]
    pub swap_mode_active: bool,
    #[serde(default)]
    pub first_participant_id: Option<ParticipantId>,
    /// Participant id -> gift they may not take back this turn.
    #[serde(default)]
    pub immediate_steal_blocks: BTreeMap<ParticipantId, GiftId>,
    #[serde(default, alias = "currentCategory")]
    pub current_country: Option<String>,
}

impl GameSnapshot {
    pub fn participant(&self, id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    pub fn gift(&self, id: &str) -> Option<&Gift> {
        self.gifts.iter().find(|g| g.id == id)
    }

    pub fn current_participant(&self) -> Option<&Participant> {
        self.current_participant_id
            .as_deref()
            .and_then(|id| self.participant(id))
    }

    /// 1-based slot of a gift in the full gift sequence.
    pub fn gift_position(&self, id: &str) -> Option<usize> {
        self.gifts.iter().position(|g| g.id == id).map(|i| i + 1)
    }

    pub fn participant_name(&self, id: &str) -> Option<&str> {
        self.participant(id).map(|p| p.name.as_str())
    }
}
