use std::str::FromStr;

use tracing::warn;

use crate::constants::{default_active_cap, DEFAULT_MOVE_COOLDOWN_MS, MAZE_SIZE};
use crate::types::GameKind;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Minimum gap between two accepted moves of one agent, across all games.
    pub move_cooldown_ms: u64,
    pub guessing_cap: usize,
    pub battleship_cap: usize,
    pub maze_cap: usize,
    pub maze_size: usize,
    /// Fixed seed for reproducible boards; `None` seeds from entropy.
    pub seed: Option<u32>,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            move_cooldown_ms: DEFAULT_MOVE_COOLDOWN_MS,
            guessing_cap: default_active_cap(GameKind::Guessing),
            battleship_cap: default_active_cap(GameKind::Battleship),
            maze_cap: default_active_cap(GameKind::Maze),
            maze_size: MAZE_SIZE,
            seed: None,
        }
    }
}

impl ArenaConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let config = Self {
            move_cooldown_ms: read_var(
                &lookup,
                "ARENA_MOVE_COOLDOWN_MS",
                defaults.move_cooldown_ms,
            ),
            guessing_cap: read_var(&lookup, "ARENA_GUESSING_CAP", defaults.guessing_cap),
            battleship_cap: read_var(&lookup, "ARENA_BATTLESHIP_CAP", defaults.battleship_cap),
            maze_cap: read_var(&lookup, "ARENA_MAZE_CAP", defaults.maze_cap),
            maze_size: read_var(&lookup, "ARENA_MAZE_SIZE", defaults.maze_size),
            seed: lookup("ARENA_SEED").and_then(|raw| parse_or_warn("ARENA_SEED", &raw)),
        };
        config.sanitized()
    }

    pub fn active_cap(&self, kind: GameKind) -> usize {
        match kind {
            GameKind::Guessing => self.guessing_cap,
            GameKind::Battleship => self.battleship_cap,
            GameKind::Maze => self.maze_cap,
        }
    }

    fn sanitized(mut self) -> Self {
        if self.maze_size < 2 {
            warn!(maze_size = self.maze_size, "maze size below 2, using default");
            self.maze_size = MAZE_SIZE;
        }
        self
    }
}

fn read_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> T
where
    T: FromStr,
{
    lookup(name)
        .and_then(|raw| parse_or_warn(name, &raw))
        .unwrap_or(default)
}

fn parse_or_warn<T: FromStr>(name: &str, raw: &str) -> Option<T> {
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(var = name, value = raw, "ignoring unparsable config value");
            None
        }
    }
}
