//! Single-slot "action in progress" indicator for host commands.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::AbortHandle;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayKind {
    Shuffle,
    Unwrap,
    Steal,
    Swap,
}

impl OverlayKind {
    pub fn title(self) -> &'static str {
        match self {
            OverlayKind::Shuffle => "Shuffling the lineup...",
            OverlayKind::Unwrap => "Unwrapping the surprise...",
            OverlayKind::Steal => "Sneaky steal in progress...",
            OverlayKind::Swap => "Swap showdown...",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            OverlayKind::Shuffle => "Mixing the turn order to keep things spicy!",
            OverlayKind::Unwrap => "Hold tight while the paper flies everywhere!",
            OverlayKind::Steal => "Somebody spotted a better present!",
            OverlayKind::Swap => "Negotiating the perfect holiday trade.",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            OverlayKind::Shuffle => "🔀",
            OverlayKind::Unwrap => "🎀",
            OverlayKind::Steal => "🕵️",
            OverlayKind::Swap => "🤝",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverlayView {
    pub kind: OverlayKind,
    pub title: &'static str,
    pub message: &'static str,
    pub emoji: &'static str,
}

impl From<OverlayKind> for OverlayView {
    fn from(kind: OverlayKind) -> Self {
        Self {
            kind,
            title: kind.title(),
            message: kind.message(),
            emoji: kind.emoji(),
        }
    }
}

/// Identifies the command that raised the overlay. A ticket from a
/// superseded command no longer affects the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayTicket(u64);

#[derive(Default)]
struct Slot {
    kind: Option<OverlayKind>,
    generation: u64,
    dismissal: Option<AbortHandle>,
}

impl Slot {
    fn cancel_dismissal(&mut self) {
        if let Some(timer) = self.dismissal.take() {
            timer.abort();
        }
    }
}

#[derive(Clone)]
pub struct OverlayCoordinator {
    slot: Arc<Mutex<Slot>>,
    dismiss_after: Duration,
}

impl OverlayCoordinator {
    pub fn new(dismiss_after: Duration) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot::default())),
            dismiss_after,
        }
    }

    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Shows `kind` right away, replacing whatever was showing.
    pub fn begin(&self, kind: OverlayKind) -> OverlayTicket {
        let mut slot = self.slot();
        slot.cancel_dismissal();
        slot.generation += 1;
        slot.kind = Some(kind);
        debug!(target: "overlay", ?kind, "overlay shown");
        OverlayTicket(slot.generation)
    }

    /// Keeps the overlay up for the dismissal delay, then clears it.
    pub fn succeed(&self, ticket: OverlayTicket) {
        let mut slot = self.slot();
        if slot.generation != ticket.0 {
            return;
        }
        slot.cancel_dismissal();

        let shared = self.slot.clone();
        let delay = self.dismiss_after;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut slot = shared.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.generation == ticket.0 {
                slot.kind = None;
                slot.dismissal = None;
            }
        });
        slot.dismissal = Some(timer.abort_handle());
    }

    pub fn fail(&self, ticket: OverlayTicket) {
        let mut slot = self.slot();
        if slot.generation != ticket.0 {
            return;
        }
        slot.cancel_dismissal();
        slot.kind = None;
    }

    pub fn current(&self) -> Option<OverlayKind> {
        self.slot().kind
    }

    pub fn dismissal_pending(&self) -> bool {
        self.slot().dismissal.is_some()
    }

    /// Clears the slot and releases the timer; outstanding tickets go stale.
    pub fn clear(&self) {
        let mut slot = self.slot();
        slot.cancel_dismissal();
        slot.generation += 1;
        slot.kind = None;
    }
}
