use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{GameSnapshot, Gift, GiftId, ParticipantId};

/// Semantic change observed between two consecutive snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum GameEvent {
    GiftRevealed {
        gift_id: GiftId,
        owner_id: Option<ParticipantId>,
    },
    GiftLocked {
        gift_id: GiftId,
    },
    ShuffleOccurred {
        first_participant_id: Option<ParticipantId>,
        /// Joined turn order; identifies this particular shuffle.
        order_key: String,
    },
    TurnAdvanced {
        participant_id: ParticipantId,
        swap_phase: bool,
    },
    SwapPhaseEntered,
    GameEnded,
}

/// Diffs `previous` against `current`. The first observation only sets the
/// baseline, so `previous == None` yields nothing.
pub fn derive_events(previous: Option<&GameSnapshot>, current: &GameSnapshot) -> Vec<GameEvent> {
    let Some(previous) = previous else {
        return Vec::new();
    };

    let mut events = Vec::new();
    gift_transitions(previous, current, &mut events);

    if let Some(event) = shuffle(previous, current) {
        events.push(event);
    }

    if let Some(current_id) = &current.current_participant_id {
        let changed = previous.current_participant_id.as_ref() != Some(current_id);
        if changed && !current.game_completed {
            events.push(GameEvent::TurnAdvanced {
                participant_id: current_id.clone(),
                swap_phase: current.swap_mode_active,
            });
        }
    }

    if !previous.swap_mode_active && current.swap_mode_active {
        events.push(GameEvent::SwapPhaseEntered);
    }

    if !previous.game_completed && current.game_completed {
        events.push(GameEvent::GameEnded);
    }

    events
}

// Only false -> true flips count; a gift that appears to un-reveal or
// un-lock is ignored.
fn gift_transitions(previous: &GameSnapshot, current: &GameSnapshot, events: &mut Vec<GameEvent>) {
    let before: HashMap<&str, &Gift> = previous
        .gifts
        .iter()
        .map(|gift| (gift.id.as_str(), gift))
        .collect();

    for gift in &current.gifts {
        let Some(old) = before.get(gift.id.as_str()) else {
            continue;
        };
        if !old.revealed && gift.revealed {
            events.push(GameEvent::GiftRevealed {
                gift_id: gift.id.clone(),
                owner_id: gift.winner_participant_id.clone(),
            });
        }
        if !old.locked && gift.locked {
            events.push(GameEvent::GiftLocked {
                gift_id: gift.id.clone(),
            });
        }
    }
}

fn shuffle(previous: &GameSnapshot, current: &GameSnapshot) -> Option<GameEvent> {
    if !previous.completed_turn_order.is_empty() || !current.completed_turn_order.is_empty() {
        return None;
    }
    if previous.upcoming_turn_order.is_empty() || current.upcoming_turn_order.is_empty() {
        return None;
    }

    let before = turn_order_key(&previous.upcoming_turn_order);
    let after = turn_order_key(&current.upcoming_turn_order);
    if before == after {
        return None;
    }

    let first_participant_id = current
        .current_participant_id
        .clone()
        .or_else(|| current.upcoming_turn_order.first().cloned());

    Some(GameEvent::ShuffleOccurred {
        first_participant_id,
        order_key: after,
    })
}

pub fn turn_order_key(order: &[ParticipantId]) -> String {
    order.join("|")
}
