//! Window selection over a skill-sorted pool snapshot
//!
//! A window is a run of `K` consecutive entries once the snapshot is sorted
//! by skill. Each window is scored by its skill spread plus a weighted
//! shortfall of role coverage, and the cheapest window is chosen.

use crate::types::{Role, Skill, WaitingEntry};
use tracing::debug;

/// Cost added per missing role slot when scoring a window
pub const COVERAGE_WEIGHT: u64 = 10;

/// The window chosen for a match attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSelection {
    /// Selected entries, ascending by skill
    pub entries: Vec<WaitingEntry>,
    /// Highest minus lowest skill in the window
    pub spread: Skill,
    /// Role slots that no entry lists as primary or secondary
    pub coverage_deficit: usize,
    /// `spread + coverage_deficit * COVERAGE_WEIGHT`
    pub score: u64,
}

/// Trait for strategies that pick a candidate group from the pool
pub trait WindowSelector: Send + Sync {
    /// Pick the best window of `window_size` entries, or `None` if the
    /// snapshot is too small
    fn find_best_window(
        &self,
        entries: &[WaitingEntry],
        window_size: usize,
        players_per_role: usize,
    ) -> Option<WindowSelection>;
}

/// Sliding-window selector minimizing spread and missing role coverage
#[derive(Debug, Default, Clone, Copy)]
pub struct SkillWindowSelector;

impl SkillWindowSelector {
    pub fn new() -> Self {
        Self
    }
}

/// Per-role count of entries that list the role as primary or secondary
#[derive(Debug, Default)]
struct RoleSupply([usize; Role::COUNT]);

impl RoleSupply {
    fn add(&mut self, entry: &WaitingEntry) {
        self.0[entry.participant.primary_role as usize] += 1;
        self.0[entry.participant.secondary_role as usize] += 1;
    }

    fn remove(&mut self, entry: &WaitingEntry) {
        self.0[entry.participant.primary_role as usize] -= 1;
        self.0[entry.participant.secondary_role as usize] -= 1;
    }

    fn deficit(&self, players_per_role: usize) -> usize {
        self.0
            .iter()
            .map(|supply| players_per_role.saturating_sub(*supply))
            .sum()
    }
}

fn window_score(spread: Skill, coverage_deficit: usize) -> u64 {
    u64::from(spread) + coverage_deficit as u64 * COVERAGE_WEIGHT
}

impl WindowSelector for SkillWindowSelector {
    fn find_best_window(
        &self,
        entries: &[WaitingEntry],
        window_size: usize,
        players_per_role: usize,
    ) -> Option<WindowSelection> {
        if window_size == 0 || entries.len() < window_size {
            return None;
        }

        // Stable: equal skills keep snapshot order
        let mut sorted: Vec<&WaitingEntry> = entries.iter().collect();
        sorted.sort_by_key(|entry| entry.skill());

        let mut supply = RoleSupply::default();
        for entry in &sorted[..window_size] {
            supply.add(entry);
        }

        // (start, spread, deficit, score)
        let mut best: Option<(usize, Skill, usize, u64)> = None;
        for start in 0..=(sorted.len() - window_size) {
            if start > 0 {
                supply.remove(sorted[start - 1]);
                supply.add(sorted[start + window_size - 1]);
            }

            let spread = sorted[start + window_size - 1].skill() - sorted[start].skill();
            let deficit = supply.deficit(players_per_role);
            let score = window_score(spread, deficit);

            // Strictly lower only, so the first window wins ties
            if best.map_or(true, |(_, _, _, best_score)| score < best_score) {
                best = Some((start, spread, deficit, score));
            }
        }

        let (start, spread, coverage_deficit, score) = best?;
        debug!(
            "Selected window at {} of {} - spread: {}, deficit: {}, score: {}",
            start,
            sorted.len(),
            spread,
            coverage_deficit,
            score
        );

        Some(WindowSelection {
            entries: sorted[start..start + window_size]
                .iter()
                .map(|entry| (*entry).clone())
                .collect(),
            spread,
            coverage_deficit,
            score,
        })
    }
}
