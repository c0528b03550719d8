//! Reference agents: they play through the same public information a remote
//! client gets, and double as oracles in tests and in the simulator.

use std::collections::{HashSet, VecDeque};

use crate::battleship::{Shot, ShotResult};
use crate::constants::{GUESS_MAX, GUESS_MIN};
use crate::guessing::GuessOutcome;
use crate::maze::{shortest_path, Maze};
use crate::rng::Rng;
use crate::types::{Cell, Direction};

/// Hunt/target battleship player.
///
/// Hunts a shuffled checkerboard until something is hit, then works through
/// the hit cell's unfired neighbours before going back to the hunt.
#[derive(Clone, Debug)]
pub struct HuntTarget {
    size: usize,
    fired: HashSet<Cell>,
    targets: VecDeque<Cell>,
    hunt: Vec<Cell>,
    hunt_index: usize,
}

impl HuntTarget {
    pub fn new(rng: &mut Rng, size: usize) -> Self {
        let mut hunt: Vec<Cell> = (0..size)
            .flat_map(|row| (0..size).map(move |col| Cell::new(row, col)))
            .filter(|cell| (cell.row + cell.col) % 2 == 0)
            .collect();
        rng.shuffle(&mut hunt);
        Self {
            size,
            fired: HashSet::new(),
            targets: VecDeque::new(),
            hunt,
            hunt_index: 0,
        }
    }

    /// Resume from a shot history. Every recorded hit sends its unfired
    /// neighbours back onto the target queue, including hits on ships that
    /// sank later. Sinking shots queue nothing.
    pub fn from_history(rng: &mut Rng, size: usize, shots: &[Shot]) -> Self {
        let mut strategy = Self::new(rng, size);
        strategy.fired.extend(shots.iter().map(Shot::cell));
        for shot in shots.iter().filter(|shot| shot.result == ShotResult::Hit) {
            strategy.queue_neighbours(shot.cell());
        }
        strategy
    }

    pub fn next_target(&mut self) -> Option<Cell> {
        while let Some(cell) = self.targets.pop_front() {
            if !self.fired.contains(&cell) {
                return Some(cell);
            }
        }
        while self.hunt_index < self.hunt.len() {
            let cell = self.hunt[self.hunt_index];
            self.hunt_index += 1;
            if !self.fired.contains(&cell) {
                return Some(cell);
            }
        }
        (0..self.size)
            .flat_map(|row| (0..self.size).map(move |col| Cell::new(row, col)))
            .find(|cell| !self.fired.contains(cell))
    }

    pub fn record(&mut self, cell: Cell, result: ShotResult) {
        self.fired.insert(cell);
        if result == ShotResult::Hit {
            self.queue_neighbours(cell);
        }
    }

    fn queue_neighbours(&mut self, cell: Cell) {
        for dir in Direction::ALL {
            if let Some(next) = dir.step(cell, self.size) {
                if !self.fired.contains(&next) {
                    self.targets.push_back(next);
                }
            }
        }
    }
}

/// Follows a breadth-first route over the revealed walls.
#[derive(Clone, Debug, Default)]
pub struct MazeFollower {
    route: VecDeque<Direction>,
}

impl MazeFollower {
    pub fn plan(maze: &Maze, position: Cell) -> Self {
        let route = shortest_path(maze, position, maze.goal).unwrap_or_default();
        Self {
            route: route.into(),
        }
    }

    pub fn next_direction(&mut self) -> Option<Direction> {
        self.route.pop_front()
    }

    pub fn remaining(&self) -> usize {
        self.route.len()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BinarySearchGuesser {
    low: i64,
    high: i64,
}

impl Default for BinarySearchGuesser {
    fn default() -> Self {
        Self {
            low: GUESS_MIN,
            high: GUESS_MAX,
        }
    }
}

impl BinarySearchGuesser {
    pub fn next_guess(&self) -> Option<i64> {
        (self.low <= self.high).then(|| (self.low + self.high) / 2)
    }

    pub fn record(&mut self, guess: i64, outcome: GuessOutcome) {
        match outcome {
            GuessOutcome::Higher => self.low = guess + 1,
            GuessOutcome::Lower => self.high = guess - 1,
            GuessOutcome::Correct => {
                self.low = guess;
                self.high = guess;
            }
        }
    }
}
