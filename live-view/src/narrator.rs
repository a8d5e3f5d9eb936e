//! Host narration: turns derived game events into spoken lines.

use std::collections::HashSet;

use game_core::{GameEvent, GameSnapshot, GiftId, Participant, ParticipantId};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::narration::{NarrationScheduler, NarrationSegment};

const JOKES: [&str; 5] = [
    "If you do not like your gift, just remember, regifting is the circle of life - at least in this room.",
    "Nothing says team bonding like watching colleagues wrestle over a novelty waffle iron.",
    "Pro tip: a poker face is useless here. Wear your emotions like an ugly Christmas sweater.",
    "Stealing a gift is encouraged. Stealing someone's snacks is risky - choose wisely.",
    "This is the only meeting where shouting \"Mine!\" is considered productive participation.",
];

/// What has already been announced, per event category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnouncedMarkers {
    pub last_turn: Option<ParticipantId>,
    pub revealed_gifts: HashSet<GiftId>,
    pub last_shuffle: Option<String>,
    pub swap_intro_delivered: bool,
    pub game_end_announced: bool,
}

struct JokeRotation {
    next: usize,
}

impl JokeRotation {
    fn seeded(seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            next: rng.gen_range(0..JOKES.len()),
        }
    }

    fn take(&mut self) -> &'static str {
        let joke = JOKES[self.next];
        self.next = (self.next + 1) % JOKES.len();
        joke
    }
}

pub struct Narrator {
    scheduler: NarrationScheduler,
    markers: AnnouncedMarkers,
    greeted: bool,
    jokes: JokeRotation,
}

impl Narrator {
    pub fn new(scheduler: NarrationScheduler, seed: Option<u64>) -> Self {
        Self {
            scheduler,
            markers: AnnouncedMarkers::default(),
            greeted: false,
            jokes: JokeRotation::seeded(seed),
        }
    }

    pub fn scheduler(&self) -> &NarrationScheduler {
        &self.scheduler
    }

    pub fn markers(&self) -> &AnnouncedMarkers {
        &self.markers
    }

    pub fn has_greeted(&self) -> bool {
        self.greeted
    }

    pub fn reset_for_new_game(&mut self) {
        self.markers = AnnouncedMarkers::default();
    }

    /// Host left: silence everything and start over on the next sign-in.
    pub fn sign_out(&mut self) {
        self.scheduler.cancel_all();
        self.greeted = false;
        self.reset_for_new_game();
    }

    /// Reacts to one accepted snapshot and the events derived for it.
    pub fn observe(&mut self, host_name: &str, snapshot: &GameSnapshot, events: &[GameEvent]) {
        if snapshot.participants.is_empty() {
            if self.greeted || self.markers != AnnouncedMarkers::default() {
                debug!(target: "narration", "roster emptied, resetting narration");
            }
            self.scheduler.cancel_all();
            self.greeted = false;
            self.reset_for_new_game();
            return;
        }

        if self.scheduler.is_enabled() {
            if !self.greeted {
                self.greet(host_name, snapshot.participants.len());
            }
            for event in events {
                self.announce(snapshot, event);
            }
        }

        if !snapshot.game_started && snapshot.completed_turn_order.is_empty() {
            self.reset_for_new_game();
        }
    }

    fn greet(&mut self, host_name: &str, roster: usize) {
        let host_name = if host_name.trim().is_empty() {
            "Host"
        } else {
            host_name
        };
        let mut lines = vec![
            format!("Ho ho ho! {host_name} reporting for White Elephant duty."),
            format!(
                "We have {roster} gift lovers queued up and I am here to keep things merry and mildly competitive."
            ),
            "Rules refresher: when it is your turn you pick a wrapped gift or steal a revealed one.".to_string(),
            "Gifts can only be stolen twice, so hoard carefully. When every gift is revealed, we enter a final swap round.".to_string(),
        ];
        lines.push(self.jokes.take().to_string());
        lines.push(self.jokes.take().to_string());
        lines.push(
            "Ready the ribbon and warm up your best poker face - let the gifting games begin!".to_string(),
        );
        self.scheduler.enqueue(segments(lines), true);
        self.greeted = true;
    }

    fn announce(&mut self, snapshot: &GameSnapshot, event: &GameEvent) {
        match event {
            GameEvent::ShuffleOccurred {
                first_participant_id,
                order_key,
            } => {
                if self.markers.last_shuffle.as_ref() == Some(order_key) {
                    return;
                }
                self.markers.last_shuffle = Some(order_key.clone());
                let first = first_participant_id
                    .as_deref()
                    .and_then(|id| snapshot.participant(id));
                self.scheduler.enqueue(segments(shuffle_lines(first)), true);
                if let Some(first) = first_participant_id {
                    self.markers.last_turn = Some(first.clone());
                }
            }
            GameEvent::GiftRevealed { gift_id, owner_id } => {
                if self.markers.revealed_gifts.contains(gift_id) {
                    return;
                }
                let Some(gift) = snapshot.gift(gift_id) else {
                    return;
                };
                self.markers.revealed_gifts.insert(gift_id.clone());
                let opener = owner_id
                    .as_deref()
                    .and_then(|id| snapshot.participant_name(id))
                    .unwrap_or("our latest picker");
                let mut lines = vec![format!("{opener} just cracked open gift {}!", gift.name)];
                if !gift.description.trim().is_empty() {
                    lines.push(format!("It is {}.", gift.description));
                }
                if gift.times_stolen > 0 {
                    lines.push(format!(
                        "Heads up, this treasure has already been stolen {} times!",
                        gift.times_stolen
                    ));
                }
                self.scheduler.enqueue(segments(lines), false);
            }
            GameEvent::TurnAdvanced {
                participant_id,
                swap_phase,
            } => {
                if self.markers.last_turn.as_ref() == Some(participant_id) {
                    return;
                }
                let Some(participant) = snapshot.participant(participant_id) else {
                    return;
                };
                let lines = if *swap_phase {
                    vec![
                        format!("Swap round alert! {}, you are on the clock.", participant.name),
                        "Choose wisely - steal a revealed gift or pass to lock in your prize.".to_string(),
                    ]
                } else {
                    vec![
                        format!("{}, step up to the gift mountain!", participant.name),
                        "Feel the suspense and pick a wrapped gift or steal a revealed one if you dare.".to_string(),
                    ]
                };
                self.scheduler.enqueue(segments(lines), false);
                self.markers.last_turn = Some(participant_id.clone());
            }
            GameEvent::SwapPhaseEntered => {
                if self.markers.swap_intro_delivered {
                    return;
                }
                self.markers.swap_intro_delivered = true;
                self.scheduler.enqueue(
                    segments([
                        "All gifts are on the table! We are entering the final swap showdown.",
                        "Remember, one last chance to steal before we call it a wrap.",
                    ]),
                    false,
                );
            }
            GameEvent::GameEnded => {
                if self.markers.game_end_announced {
                    return;
                }
                self.markers.game_end_announced = true;
                let joke = self.jokes.take();
                self.scheduler.enqueue(
                    segments([
                        "That is a wrap! The White Elephant extravaganza has officially concluded.",
                        "Snap a photo with your prize, thank your rivals, and cherish the chaos.",
                        joke,
                    ]),
                    false,
                );
            }
            GameEvent::GiftLocked { .. } => {}
        }
    }
}

fn shuffle_lines(first: Option<&Participant>) -> Vec<String> {
    let name = first.map(|p| p.name.as_str()).unwrap_or("our mystery friend");
    let origin = first
        .and_then(|p| p.country.as_deref())
        .map(|country| format!(" from {country}"))
        .unwrap_or_default();
    vec![
        "Names tossed, tickets shuffled, holiday chaos unlocked!".to_string(),
        format!("Leading off, please welcome {name}{origin}. Come claim your destiny."),
    ]
}

fn segments<I, S>(lines: I) -> Vec<NarrationSegment>
where
    I: IntoIterator<Item = S>,
    S: Into<NarrationSegment>,
{
    lines.into_iter().map(Into::into).collect()
}
