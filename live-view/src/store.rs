use std::sync::Arc;

use game_core::GameSnapshot;

/// Last two accepted snapshots. Replacement is last-write-wins in arrival
/// order; the caller serialises access.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    previous: Option<Arc<GameSnapshot>>,
    current: Option<Arc<GameSnapshot>>,
    accepted: u64,
}

#[derive(Debug, Clone)]
pub struct Accepted {
    pub previous: Option<Arc<GameSnapshot>>,
    pub current: Arc<GameSnapshot>,
    pub sequence: u64,
}

impl SnapshotStore {
    pub fn accept(&mut self, snapshot: GameSnapshot) -> Accepted {
        let current = Arc::new(snapshot);
        self.previous = self.current.replace(current.clone());
        self.accepted += 1;
        Accepted {
            previous: self.previous.clone(),
            current,
            sequence: self.accepted,
        }
    }

    pub fn current(&self) -> Option<Arc<GameSnapshot>> {
        self.current.clone()
    }

    pub fn previous(&self) -> Option<Arc<GameSnapshot>> {
        self.previous.clone()
    }

    pub fn accepted(&self) -> u64 {
        self.accepted
    }
}
