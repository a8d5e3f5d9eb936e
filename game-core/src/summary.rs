use serde::Serialize;
use std::cmp::Ordering;

use crate::GameSnapshot;

pub const NOT_CLAIMED: &str = "Gift not yet claimed";
pub const WINNER_MISSING: &str = "Winner not found";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRow {
    pub gift_id: String,
    pub gift_name: String,
    pub url: Option<String>,
    pub owner_name: String,
    pub owner_country: Option<String>,
    pub winner_name: String,
    pub winner_country: Option<String>,
    pub winner_status: Option<&'static str>,
    pub is_self_match: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SummaryStats {
    pub total: usize,
    pub unclaimed: usize,
    pub self_matches: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SummaryView {
    pub ready: bool,
    pub rows: Vec<SummaryRow>,
    pub stats: SummaryStats,
}

/// Final matches, populated only once the game has completed.
pub fn project_summary(snapshot: &GameSnapshot) -> SummaryView {
    if !snapshot.game_completed {
        return SummaryView {
            ready: false,
            rows: Vec::new(),
            stats: SummaryStats::default(),
        };
    }

    let mut rows: Vec<SummaryRow> = snapshot
        .gifts
        .iter()
        .map(|gift| {
            let owner = gift
                .original_owner_participant_id
                .as_deref()
                .and_then(|id| snapshot.participant(id));
            let winner_id = gift.winner_participant_id.as_deref();
            let winner = winner_id.and_then(|id| snapshot.participant(id));
            let (winner_name, winner_status) = match (winner_id, winner) {
                (Some(_), Some(w)) => (w.name.clone(), None),
                (Some(_), None) => ("Unknown participant".to_string(), Some(WINNER_MISSING)),
                (None, _) => ("Unclaimed".to_string(), Some(NOT_CLAIMED)),
            };

            SummaryRow {
                gift_id: gift.id.clone(),
                gift_name: gift.name.clone(),
                url: gift.url.clone(),
                owner_name: owner
                    .map(|o| o.name.clone())
                    .unwrap_or_else(|| "Unknown participant".to_string()),
                owner_country: owner.and_then(|o| o.country.clone()),
                winner_name,
                winner_country: winner.and_then(|w| w.country.clone()),
                winner_status,
                is_self_match: winner_id.is_some()
                    && winner_id == gift.original_owner_participant_id.as_deref(),
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        by_name(&a.owner_name, &b.owner_name).then_with(|| by_name(&a.gift_name, &b.gift_name))
    });

    let stats = SummaryStats {
        total: rows.len(),
        unclaimed: rows.iter().filter(|r| r.winner_status == Some(NOT_CLAIMED)).count(),
        self_matches: rows.iter().filter(|r| r.is_self_match).count(),
    };

    SummaryView {
        ready: true,
        rows,
        stats,
    }
}

fn by_name(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
}
