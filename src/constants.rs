use crate::types::GameKind;

pub const GUESS_MIN: i64 = 1;
pub const GUESS_MAX: i64 = 100;

pub const BOARD_SIZE: usize = 10;
pub const PLACEMENT_ATTEMPTS: usize = 200;
pub const FLEET: [(&str, usize); 5] = [
    ("Carrier", 5),
    ("Battleship", 4),
    ("Cruiser", 3),
    ("Submarine", 3),
    ("Destroyer", 2),
];
pub const FLEET_CELLS: usize = 5 + 4 + 3 + 3 + 2;

pub const MAZE_SIZE: usize = 10;

pub const DEFAULT_MOVE_COOLDOWN_MS: u64 = 30_000;

pub const API_KEY_PREFIX: &str = "mab_";
pub const API_KEY_RANDOM_LEN: usize = 32;
pub const AGENT_NAME_MAX_LEN: usize = 32;

pub fn default_active_cap(kind: GameKind) -> usize {
    match kind {
        GameKind::Guessing => 1,
        GameKind::Battleship => 3,
        GameKind::Maze => 3,
    }
}

/// Shared `max(1, 101 - penalty)` shape behind every scoring formula.
pub fn floor_score(penalty: u64) -> u32 {
    101u64.saturating_sub(penalty).max(1) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fleet_cells_match_roster() {
        let total: usize = FLEET.iter().map(|(_, size)| size).sum();
        assert_eq!(total, FLEET_CELLS);
    }

    #[test]
    fn floor_score_clamps_at_one() {
        assert_eq!(floor_score(0), 101);
        assert_eq!(floor_score(100), 1);
        assert_eq!(floor_score(101), 1);
        assert_eq!(floor_score(u64::MAX), 1);
    }
}
