// Gift slot numbers always come from the full gift sequence, so filtering
// or category scoping never renumbers a gift.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::{GameSnapshot, Gift, Participant};

pub const NO_PARTICIPANT_UP: &str = "No participant is up";
pub const OTHER_CATEGORY: &str = "Gift belongs to another country";
pub const SWAP_ROUND: &str = "Unwrapping is closed during the swap round";
pub const ALREADY_REVEALED: &str = "Gift already revealed";
pub const STILL_WRAPPED: &str = "Gift has not been revealed yet";
pub const LOCKED: &str = "Gift can no longer be stolen";
pub const UNCLAIMED: &str = "Gift has no holder yet";
pub const ALREADY_HOLDING: &str = "Participant already owns this gift";
pub const STEAL_BACK: &str = "Cannot immediately steal back this gift";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum GiftFilter {
    #[default]
    All,
    Wrapped,
    Revealed,
    RevealedSteals,
    Locked,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GiftMode {
    Turn,
    Swap,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct HostSelection {
    pub filter: GiftFilter,
    pub show_all_categories: bool,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SpectatorSelection {
    pub filter: GiftFilter,
    pub participant: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FilterBucket {
    pub value: GiftFilter,
    pub label: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GiftCardView {
    pub id: String,
    pub position: usize,
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    pub country: Option<String>,
    pub revealed: bool,
    pub locked: bool,
    pub times_stolen: u32,
    pub status: String,
    pub holder_name: Option<String>,
    pub in_scope: bool,
    pub can_reveal: bool,
    pub can_steal: bool,
    pub reveal_disabled_reason: Option<&'static str>,
    pub steal_disabled_reason: Option<&'static str>,
    pub reveal_label: &'static str,
    pub steal_label: &'static str,
    pub at_risk: bool,
    pub highlighted: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantCard {
    pub id: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub country: Option<String>,
    pub is_current: bool,
    pub is_first: bool,
    pub gift_name: Option<String>,
    pub gift_locked: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HostView {
    pub mode: GiftMode,
    pub swap_mode_active: bool,
    pub game_started: bool,
    pub game_completed: bool,
    pub can_shuffle: bool,
    pub current_participant_id: Option<String>,
    pub current_participant_name: String,
    pub current_participant_country: Option<String>,
    pub active_swap_category: Option<String>,
    pub show_all_categories: bool,
    pub eligible_gift_count: usize,
    pub active_filter: GiftFilter,
    pub filters: Vec<FilterBucket>,
    pub gifts: Vec<GiftCardView>,
    pub participants: Vec<ParticipantCard>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LookupOutcome {
    NoCode,
    #[serde(rename_all = "camelCase")]
    ParticipantNotFound {
        code: String,
    },
    #[serde(rename_all = "camelCase")]
    GiftNotFound {
        participant_id: String,
        participant_name: String,
    },
    #[serde(rename_all = "camelCase")]
    Found {
        participant_id: String,
        participant_name: String,
        gift_id: String,
        position: usize,
        total_gifts: usize,
        revealed: bool,
        holder_id: Option<String>,
        holder_name: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SpectatorView {
    pub status_message: String,
    pub current_turn_name: Option<String>,
    pub mode: GiftMode,
    pub revealed_count: usize,
    pub locked_count: usize,
    pub total_gifts: usize,
    pub turns_played: usize,
    pub next_up: Option<String>,
    pub participant_code: Option<String>,
    pub lookup: LookupOutcome,
    pub highlight_visible: bool,
    pub active_filter: GiftFilter,
    pub filters: Vec<FilterBucket>,
    pub gifts: Vec<GiftCardView>,
    pub participants: Vec<ParticipantCard>,
}

pub fn swap_mode_active(snapshot: &GameSnapshot) -> bool {
    snapshot.swap_mode_active || (snapshot.final_swap_available && !snapshot.game_completed)
}

fn mode_of(snapshot: &GameSnapshot) -> GiftMode {
    if swap_mode_active(snapshot) {
        GiftMode::Swap
    } else {
        GiftMode::Turn
    }
}

fn in_scope(gift: &Gift, scope: Option<&str>) -> bool {
    match scope {
        Some(country) => gift.country.as_deref() == Some(country),
        None => true,
    }
}

pub fn reveal_block_reason(
    gift: &Gift,
    acting: Option<&Participant>,
    mode: GiftMode,
) -> Option<&'static str> {
    if mode == GiftMode::Swap {
        return Some(SWAP_ROUND);
    }
    let acting = match acting {
        Some(participant) => participant,
        None => return Some(NO_PARTICIPANT_UP),
    };
    if !in_scope(gift, acting.country.as_deref()) {
        return Some(OTHER_CATEGORY);
    }
    if gift.revealed {
        return Some(ALREADY_REVEALED);
    }
    None
}

// Category scoping and the immediate-steal-block each refuse a steal on
// their own.
pub fn steal_block_reason(
    snapshot: &GameSnapshot,
    gift: &Gift,
    acting: Option<&Participant>,
) -> Option<&'static str> {
    let acting = match acting {
        Some(participant) => participant,
        None => return Some(NO_PARTICIPANT_UP),
    };
    if !in_scope(gift, acting.country.as_deref()) {
        return Some(OTHER_CATEGORY);
    }
    if !gift.revealed {
        return Some(STILL_WRAPPED);
    }
    if gift.locked {
        return Some(LOCKED);
    }
    let Some(winner) = gift.winner_participant_id.as_deref() else {
        return Some(UNCLAIMED);
    };
    if winner == acting.id {
        return Some(ALREADY_HOLDING);
    }
    if snapshot.immediate_steal_blocks.get(&acting.id) == Some(&gift.id) {
        return Some(STEAL_BACK);
    }
    None
}

fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

fn apply_filter<'a>(gifts: &[&'a Gift], filter: GiftFilter) -> Vec<&'a Gift> {
    match filter {
        GiftFilter::All => gifts.to_vec(),
        GiftFilter::Wrapped => gifts.iter().copied().filter(|g| !g.revealed).collect(),
        GiftFilter::Revealed => gifts.iter().copied().filter(|g| g.revealed).collect(),
        GiftFilter::Locked => gifts.iter().copied().filter(|g| g.locked).collect(),
        GiftFilter::RevealedSteals => {
            let mut revealed: Vec<&Gift> = gifts.iter().copied().filter(|g| g.revealed).collect();
            // sort_by is stable, so equal keys keep their incoming order.
            revealed.sort_by(|a, b| {
                a.times_stolen
                    .cmp(&b.times_stolen)
                    .then_with(|| compare_names(&a.name, &b.name))
            });
            revealed
        }
    }
}

fn host_buckets(visible: &[&Gift]) -> Vec<FilterBucket> {
    let revealed = visible.iter().filter(|g| g.revealed).count();
    vec![
        FilterBucket {
            value: GiftFilter::Wrapped,
            label: "Show wrapped",
            count: visible.len() - revealed,
        },
        FilterBucket {
            value: GiftFilter::Revealed,
            label: "Show revealed",
            count: revealed,
        },
        FilterBucket {
            value: GiftFilter::RevealedSteals,
            label: "Show revealed in steal counter asc",
            count: revealed,
        },
        FilterBucket {
            value: GiftFilter::All,
            label: "Show all",
            count: visible.len(),
        },
    ]
}

fn spectator_buckets(gifts: &[&Gift]) -> Vec<FilterBucket> {
    let revealed = gifts.iter().filter(|g| g.revealed).count();
    let locked = gifts.iter().filter(|g| g.locked).count();
    vec![
        FilterBucket {
            value: GiftFilter::All,
            label: "All gifts",
            count: gifts.len(),
        },
        FilterBucket {
            value: GiftFilter::Revealed,
            label: "Opened gifts",
            count: revealed,
        },
        FilterBucket {
            value: GiftFilter::Wrapped,
            label: "Wrapped gifts",
            count: gifts.len() - revealed,
        },
        FilterBucket {
            value: GiftFilter::Locked,
            label: "Locked gifts",
            count: locked,
        },
    ]
}

fn card(snapshot: &GameSnapshot, gift: &Gift, mode: GiftMode) -> GiftCardView {
    let holder_name = gift
        .winner_participant_id
        .as_deref()
        .and_then(|id| snapshot.participant_name(id))
        .map(str::to_string);
    let status = match (gift.revealed, &holder_name) {
        (true, Some(name)) => format!("Owned by {name}"),
        (true, None) => "Revealed".to_string(),
        (false, _) => "Wrapped".to_string(),
    };

    GiftCardView {
        id: gift.id.clone(),
        position: snapshot.gift_position(&gift.id).unwrap_or_default(),
        title: if gift.revealed {
            gift.name.clone()
        } else {
            "Mystery Gift".to_string()
        },
        description: if gift.revealed {
            gift.description.clone()
        } else {
            "Waiting to be revealed".to_string()
        },
        image: gift
            .revealed
            .then(|| gift.primary_image().map(str::to_string))
            .flatten(),
        country: gift.country.clone(),
        revealed: gift.revealed,
        locked: gift.locked,
        times_stolen: gift.times_stolen,
        status,
        holder_name,
        in_scope: true,
        can_reveal: false,
        can_steal: false,
        reveal_disabled_reason: None,
        steal_disabled_reason: None,
        reveal_label: if gift.revealed { "Revealed" } else { "Unwrap gift" },
        steal_label: match mode {
            GiftMode::Swap => "Swap for this gift",
            GiftMode::Turn => "Steal gift",
        },
        at_risk: false,
        highlighted: false,
    }
}

fn participant_cards(snapshot: &GameSnapshot) -> Vec<ParticipantCard> {
    let current = snapshot.current_participant_id.as_deref();
    let mut cards: Vec<ParticipantCard> = snapshot
        .participants
        .iter()
        .map(|participant| {
            let gift = participant
                .current_gift_id
                .as_deref()
                .and_then(|id| snapshot.gift(id));
            ParticipantCard {
                id: participant.id.clone(),
                name: participant.name.clone(),
                avatar_url: participant.avatar_url.clone(),
                country: participant.country.clone(),
                is_current: Some(participant.id.as_str()) == current,
                is_first: snapshot.first_participant_id.as_deref() == Some(participant.id.as_str()),
                gift_name: gift.map(|g| g.name.clone()),
                gift_locked: gift.map(|g| g.locked).unwrap_or(false),
            }
        })
        .collect();
    // Current participant first; the rest keep roster order.
    cards.sort_by_key(|card| !card.is_current);
    cards
}

pub fn project_host(snapshot: &GameSnapshot, selection: &HostSelection) -> HostView {
    let mode = mode_of(snapshot);
    let acting = snapshot.current_participant();
    let scope = acting.and_then(|p| p.country.as_deref());

    let all: Vec<&Gift> = snapshot.gifts.iter().collect();
    let eligible: Vec<&Gift> = all.iter().copied().filter(|g| in_scope(g, scope)).collect();
    let visible = if selection.show_all_categories {
        all
    } else {
        eligible.clone()
    };

    let gifts = apply_filter(&visible, selection.filter)
        .into_iter()
        .map(|gift| {
            let reveal_reason = reveal_block_reason(gift, acting, mode);
            let steal_reason = steal_block_reason(snapshot, gift, acting);
            GiftCardView {
                in_scope: in_scope(gift, scope),
                can_reveal: reveal_reason.is_none(),
                can_steal: steal_reason.is_none(),
                reveal_disabled_reason: reveal_reason,
                steal_disabled_reason: steal_reason,
                at_risk: acting.is_some_and(|p| {
                    gift.winner_participant_id.as_deref() == Some(p.id.as_str()) && !gift.locked
                }),
                ..card(snapshot, gift, mode)
            }
        })
        .collect();

    HostView {
        mode,
        swap_mode_active: mode == GiftMode::Swap,
        game_started: snapshot.game_started,
        game_completed: snapshot.game_completed,
        can_shuffle: !snapshot.game_started
            && !snapshot.game_completed
            && snapshot.completed_turn_order.is_empty(),
        current_participant_id: acting.map(|p| p.id.clone()),
        current_participant_name: acting
            .map(|p| p.name.clone())
            .unwrap_or_else(|| "Awaiting next participant".to_string()),
        current_participant_country: acting.and_then(|p| p.country.clone()),
        active_swap_category: snapshot.current_country.clone(),
        show_all_categories: selection.show_all_categories,
        eligible_gift_count: eligible.len(),
        active_filter: selection.filter,
        filters: host_buckets(&visible),
        gifts,
        participants: participant_cards(snapshot),
    }
}

fn normalize_code(code: Option<&str>) -> Option<String> {
    code.map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

pub fn lookup_participant(snapshot: &GameSnapshot, code: Option<&str>) -> LookupOutcome {
    let Some(code) = normalize_code(code) else {
        return LookupOutcome::NoCode;
    };
    let wanted = code.to_lowercase();
    let Some(participant) = snapshot
        .participants
        .iter()
        .find(|p| p.id.to_lowercase() == wanted)
    else {
        return LookupOutcome::ParticipantNotFound { code };
    };

    let Some(gift) = snapshot
        .gifts
        .iter()
        .find(|g| g.original_owner_participant_id.as_deref() == Some(participant.id.as_str()))
    else {
        return LookupOutcome::GiftNotFound {
            participant_id: participant.id.clone(),
            participant_name: participant.name.clone(),
        };
    };

    let holder_id = gift.winner_participant_id.clone();
    let holder_name = holder_id
        .as_deref()
        .and_then(|id| snapshot.participant_name(id))
        .map(str::to_string);

    LookupOutcome::Found {
        participant_id: participant.id.clone(),
        participant_name: participant.name.clone(),
        gift_id: gift.id.clone(),
        position: snapshot.gift_position(&gift.id).unwrap_or_default(),
        total_gifts: snapshot.gifts.len(),
        revealed: gift.revealed,
        holder_id,
        holder_name,
    }
}

fn format_next_up(names: &[&str]) -> Option<String> {
    match names {
        [] => None,
        [one] => Some(one.to_string()),
        [a, b] => Some(format!("{a} and {b}")),
        [rest @ .., last] => Some(format!("{}, and {last}", rest.join(", "))),
    }
}

fn status_message(snapshot: &GameSnapshot, current: Option<&Participant>) -> String {
    if !snapshot.game_started {
        return "Waiting for the host to kick things off.".to_string();
    }
    if snapshot.game_completed {
        return "The game has wrapped up. Thanks for playing!".to_string();
    }
    if swap_mode_active(snapshot) {
        return match current {
            Some(p) => format!("{} is deciding on a final swap.", p.name),
            None => "Final swap round is happening now.".to_string(),
        };
    }
    match current {
        Some(p) => format!("{} is choosing a gift.", p.name),
        None => "Preparing the next participant.".to_string(),
    }
}

pub fn project_spectator(snapshot: &GameSnapshot, selection: &SpectatorSelection) -> SpectatorView {
    let mode = mode_of(snapshot);
    let current = snapshot.current_participant();
    let participant_code = normalize_code(selection.participant.as_deref());
    let lookup = lookup_participant(snapshot, participant_code.as_deref());
    let highlight = match &lookup {
        LookupOutcome::Found { gift_id, .. } => Some(gift_id.as_str()),
        _ => None,
    };

    let mut sorted: Vec<&Gift> = snapshot.gifts.iter().collect();
    sorted.sort_by(|a, b| {
        b.revealed
            .cmp(&a.revealed)
            .then_with(|| b.locked.cmp(&a.locked))
            .then_with(|| compare_names(&a.name, &b.name))
    });

    let gifts: Vec<GiftCardView> = apply_filter(&sorted, selection.filter)
        .into_iter()
        .map(|gift| GiftCardView {
            highlighted: Some(gift.id.as_str()) == highlight,
            ..card(snapshot, gift, mode)
        })
        .collect();
    let highlight_visible = gifts.iter().any(|g| g.highlighted);

    let upcoming: Vec<&str> = snapshot
        .upcoming_turn_order
        .iter()
        .filter_map(|id| snapshot.participant_name(id))
        .take(3)
        .collect();

    SpectatorView {
        status_message: status_message(snapshot, current),
        current_turn_name: current.map(|p| p.name.clone()),
        mode,
        revealed_count: snapshot.gifts.iter().filter(|g| g.revealed).count(),
        locked_count: snapshot.gifts.iter().filter(|g| g.locked).count(),
        total_gifts: snapshot.gifts.len(),
        turns_played: snapshot.completed_turn_order.len(),
        next_up: format_next_up(&upcoming),
        participant_code,
        lookup,
        highlight_visible,
        active_filter: selection.filter,
        filters: spectator_buckets(&sorted),
        gifts,
        participants: participant_cards(snapshot),
    }
}
