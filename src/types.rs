use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
}

impl Cell {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "north" => Some(Self::North),
            "south" => Some(Self::South),
            "east" => Some(Self::East),
            "west" => Some(Self::West),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::North => "north",
            Self::South => "south",
            Self::East => "east",
            Self::West => "west",
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::North => Self::South,
            Self::South => Self::North,
            Self::East => Self::West,
            Self::West => Self::East,
        }
    }

    /// Neighbor of `cell` in this direction, or `None` when it would leave a
    /// `size`×`size` grid.
    pub fn step(self, cell: Cell, size: usize) -> Option<Cell> {
        let Cell { row, col } = cell;
        let next = match self {
            Self::North => Cell::new(row.checked_sub(1)?, col),
            Self::South => Cell::new(row + 1, col),
            Self::East => Cell::new(row, col + 1),
            Self::West => Cell::new(row, col.checked_sub(1)?),
        };
        if next.row >= size || next.col >= size {
            return None;
        }
        Some(next)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameKind {
    Guessing,
    Battleship,
    Maze,
}

impl GameKind {
    pub const ALL: [GameKind; 3] = [GameKind::Guessing, GameKind::Battleship, GameKind::Maze];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Guessing => "guessing",
            Self::Battleship => "battleship",
            Self::Maze => "maze",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "guessing" => Some(Self::Guessing),
            "battleship" => Some(Self::Battleship),
            "maze" => Some(Self::Maze),
            _ => None,
        }
    }
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
