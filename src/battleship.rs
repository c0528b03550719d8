//! Battleship against a hidden, randomly placed fleet.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{floor_score, BOARD_SIZE, FLEET, PLACEMENT_ATTEMPTS};
use crate::error::{ArenaError, ArenaResult};
use crate::rng::Rng;
use crate::types::Cell;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlacementError {
    #[error("expected {expected} placements, got {actual}")]
    WrongShipCount { expected: usize, actual: usize },
    #[error("{0} does not fit on the board")]
    OutOfBounds(String),
    #[error("{0} overlaps another ship")]
    Overlaps(String),
    #[error("could not place {ship} after {attempts} attempts")]
    Exhausted { ship: String, attempts: usize },
}

impl From<PlacementError> for ArenaError {
    fn from(err: PlacementError) -> Self {
        ArenaError::Generation(err.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ship {
    pub name: String,
    pub size: usize,
    pub cells: Vec<Cell>,
    pub hits: usize,
    pub sunk: bool,
}

impl Ship {
    fn new(name: &str, cells: Vec<Cell>) -> Self {
        Self {
            name: name.to_string(),
            size: cells.len(),
            cells,
            hits: 0,
            sunk: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub size: usize,
    pub ships: Vec<Ship>,
}

impl Board {
    /// Randomly place the standard fleet, largest ships first.
    pub fn random(rng: &mut Rng) -> Result<Self, PlacementError> {
        place_fleet(rng, &FLEET, BOARD_SIZE, PLACEMENT_ATTEMPTS)
    }

    /// Build the standard fleet from explicit origins, in roster order.
    pub fn from_placements(placements: &[(Cell, Orientation)]) -> Result<Self, PlacementError> {
        if placements.len() != FLEET.len() {
            return Err(PlacementError::WrongShipCount {
                expected: FLEET.len(),
                actual: placements.len(),
            });
        }
        let mut occupied = HashSet::new();
        let mut ships = Vec::with_capacity(FLEET.len());
        for (&(name, size), &(origin, orientation)) in FLEET.iter().zip(placements) {
            let cells = ship_cells(origin, orientation, size, BOARD_SIZE)
                .ok_or_else(|| PlacementError::OutOfBounds(name.to_string()))?;
            if cells.iter().any(|cell| occupied.contains(cell)) {
                return Err(PlacementError::Overlaps(name.to_string()));
            }
            occupied.extend(cells.iter().copied());
            ships.push(Ship::new(name, cells));
        }
        Ok(Self {
            size: BOARD_SIZE,
            ships,
        })
    }

    pub fn occupied_cells(&self) -> impl Iterator<Item = Cell> + '_ {
        self.ships.iter().flat_map(|ship| ship.cells.iter().copied())
    }

    /// Resolve a shot. Callers must reject coordinates that were already fired.
    pub fn resolve_shot(&mut self, cell: Cell) -> ShotOutcome {
        for ship in &mut self.ships {
            if !ship.cells.contains(&cell) {
                continue;
            }
            ship.hits += 1;
            if ship.hits >= ship.size {
                ship.sunk = true;
                return ShotOutcome::Sunk {
                    ship: ship.name.clone(),
                    cells: ship.cells.clone(),
                };
            }
            return ShotOutcome::Hit;
        }
        ShotOutcome::Miss
    }

    pub fn all_sunk(&self) -> bool {
        self.ships.iter().all(|ship| ship.sunk)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShotResult {
    Miss,
    Hit,
    Sunk,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShotOutcome {
    Miss,
    Hit,
    /// Only now is the sunk ship's shape revealed.
    Sunk { ship: String, cells: Vec<Cell> },
}

impl ShotOutcome {
    pub fn result(&self) -> ShotResult {
        match self {
            Self::Miss => ShotResult::Miss,
            Self::Hit => ShotResult::Hit,
            Self::Sunk { .. } => ShotResult::Sunk,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shot {
    pub row: usize,
    pub col: usize,
    pub result: ShotResult,
}

impl Shot {
    pub fn cell(&self) -> Cell {
        Cell::new(self.row, self.col)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleshipGame {
    pub board: Board,
    pub shots: Vec<Shot>,
}

impl BattleshipGame {
    pub fn new(rng: &mut Rng) -> ArenaResult<Self> {
        Ok(Self::with_board(Board::random(rng)?))
    }

    pub fn with_board(board: Board) -> Self {
        Self {
            board,
            shots: Vec::new(),
        }
    }

    pub fn already_fired(&self, cell: Cell) -> bool {
        self.shots.iter().any(|shot| shot.cell() == cell)
    }

    pub fn fire(&mut self, cell: Cell) -> ShotOutcome {
        let outcome = self.board.resolve_shot(cell);
        self.shots.push(Shot {
            row: cell.row,
            col: cell.col,
            result: outcome.result(),
        });
        outcome
    }

    pub fn shot_count(&self) -> usize {
        self.shots.len()
    }

    pub fn all_sunk(&self) -> bool {
        self.board.all_sunk()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetEntry {
    pub name: String,
    pub size: usize,
}

pub fn fleet() -> Vec<FleetEntry> {
    FLEET
        .iter()
        .map(|(name, size)| FleetEntry {
            name: name.to_string(),
            size: *size,
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SunkShipView {
    pub name: String,
    pub size: usize,
    pub cells: Vec<Cell>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpectatorBoard {
    pub sunk_ships: Vec<SunkShipView>,
    pub total_ships: usize,
    pub ships_remaining: usize,
}

/// Board as anyone but the server may see it: only sunk ships are revealed.
pub fn spectator_view(board: &Board) -> SpectatorBoard {
    let sunk_ships: Vec<SunkShipView> = board
        .ships
        .iter()
        .filter(|ship| ship.sunk)
        .map(|ship| SunkShipView {
            name: ship.name.clone(),
            size: ship.size,
            cells: ship.cells.clone(),
        })
        .collect();
    let total_ships = board.ships.len();
    SpectatorBoard {
        ships_remaining: total_ships - sunk_ships.len(),
        sunk_ships,
        total_ships,
    }
}

pub fn validate_coordinate(row: i64, col: i64) -> ArenaResult<Cell> {
    let max = BOARD_SIZE as i64 - 1;
    if !(0..=max).contains(&row) || !(0..=max).contains(&col) {
        return Err(ArenaError::validation(format!(
            "row and col must be integers 0-{max}"
        )));
    }
    Ok(Cell::new(row as usize, col as usize))
}

pub fn score(shot_count: usize) -> u32 {
    floor_score(shot_count as u64)
}

fn ship_cells(
    origin: Cell,
    orientation: Orientation,
    size: usize,
    grid: usize,
) -> Option<Vec<Cell>> {
    let fits = match orientation {
        Orientation::Horizontal => origin.row < grid && origin.col + size <= grid,
        Orientation::Vertical => origin.col < grid && origin.row + size <= grid,
    };
    if !fits {
        return None;
    }
    Some(
        (0..size)
            .map(|i| match orientation {
                Orientation::Horizontal => Cell::new(origin.row, origin.col + i),
                Orientation::Vertical => Cell::new(origin.row + i, origin.col),
            })
            .collect(),
    )
}

fn place_fleet(
    rng: &mut Rng,
    fleet: &[(&str, usize)],
    grid: usize,
    attempts: usize,
) -> Result<Board, PlacementError> {
    let mut occupied: HashSet<Cell> = HashSet::new();
    let mut ships = Vec::with_capacity(fleet.len());

    for &(name, size) in fleet {
        if size == 0 || size > grid {
            return Err(PlacementError::OutOfBounds(name.to_string()));
        }
        let mut placed = None;
        for _ in 0..attempts {
            let orientation = if rng.bool(0.5) {
                Orientation::Horizontal
            } else {
                Orientation::Vertical
            };
            let (max_row, max_col) = match orientation {
                Orientation::Horizontal => (grid - 1, grid - size),
                Orientation::Vertical => (grid - size, grid - 1),
            };
            let origin = Cell::new(
                rng.int(0, max_row as i32) as usize,
                rng.int(0, max_col as i32) as usize,
            );
            let Some(cells) = ship_cells(origin, orientation, size, grid) else {
                continue;
            };
            if cells.iter().any(|cell| occupied.contains(cell)) {
                continue;
            }
            placed = Some(cells);
            break;
        }
        let Some(cells) = placed else {
            return Err(PlacementError::Exhausted {
                ship: name.to_string(),
                attempts,
            });
        };
        occupied.extend(cells.iter().copied());
        ships.push(Ship::new(name, cells));
    }

    Ok(Board { size: grid, ships })
}
