//! Maze navigation: a spanning-tree maze carved by recursive backtracking,
//! walked one cell at a time from the top-left corner to the bottom-right.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::constants::floor_score;
use crate::error::{ArenaError, ArenaResult};
use crate::rng::Rng;
use crate::types::{Cell, Direction};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Walls {
    pub north: bool,
    pub south: bool,
    pub east: bool,
    pub west: bool,
}

impl Walls {
    pub const CLOSED: Walls = Walls {
        north: true,
        south: true,
        east: true,
        west: true,
    };

    pub fn has(&self, dir: Direction) -> bool {
        match dir {
            Direction::North => self.north,
            Direction::South => self.south,
            Direction::East => self.east,
            Direction::West => self.west,
        }
    }

    fn open(&mut self, dir: Direction) {
        match dir {
            Direction::North => self.north = false,
            Direction::South => self.south = false,
            Direction::East => self.east = false,
            Direction::West => self.west = false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Maze {
    pub size: usize,
    pub grid: Vec<Vec<Walls>>,
    pub start: Cell,
    pub goal: Cell,
}

impl Maze {
    /// Carve a `size`×`size` maze starting from (0, 0).
    ///
    /// Every cell is visited exactly once and each visit opens exactly one
    /// wall, so the passages form a spanning tree over the grid.
    pub fn generate(rng: &mut Rng, size: usize) -> ArenaResult<Self> {
        if size < 2 {
            return Err(ArenaError::Generation(format!(
                "maze size must be at least 2, got {size}"
            )));
        }
        let mut grid = vec![vec![Walls::CLOSED; size]; size];
        let mut visited = vec![vec![false; size]; size];
        let start = Cell::new(0, 0);

        let mut stack: Vec<(Cell, [Direction; 4], usize)> = Vec::new();
        visited[start.row][start.col] = true;
        stack.push((start, shuffled_directions(rng), 0));

        while let Some(frame) = stack.last_mut() {
            if frame.2 == frame.1.len() {
                stack.pop();
                continue;
            }
            let dir = frame.1[frame.2];
            frame.2 += 1;
            let cell = frame.0;

            let Some(next) = dir.step(cell, size) else {
                continue;
            };
            if visited[next.row][next.col] {
                continue;
            }
            grid[cell.row][cell.col].open(dir);
            grid[next.row][next.col].open(dir.opposite());
            visited[next.row][next.col] = true;
            stack.push((next, shuffled_directions(rng), 0));
        }

        Ok(Self {
            size,
            grid,
            start,
            goal: Cell::new(size - 1, size - 1),
        })
    }

    pub fn walls(&self, cell: Cell) -> Option<&Walls> {
        self.grid.get(cell.row).and_then(|row| row.get(cell.col))
    }

    pub fn can_move(&self, pos: Cell, dir: Direction) -> bool {
        let Some(walls) = self.walls(pos) else {
            return false;
        };
        !walls.has(dir) && dir.step(pos, self.size).is_some()
    }

    /// Count of opened interior walls, each passage counted once.
    pub fn passage_count(&self) -> usize {
        let mut count = 0;
        for row in 0..self.size {
            for col in 0..self.size {
                let walls = &self.grid[row][col];
                if col + 1 < self.size && !walls.east {
                    count += 1;
                }
                if row + 1 < self.size && !walls.south {
                    count += 1;
                }
            }
        }
        count
    }
}

fn shuffled_directions(rng: &mut Rng) -> [Direction; 4] {
    let mut dirs = Direction::ALL;
    rng.shuffle(&mut dirs);
    dirs
}

/// Position after moving one cell; `None` only when the move would leave the
/// grid through row or column zero.
pub fn apply_move(pos: Cell, dir: Direction) -> Option<Cell> {
    match dir {
        Direction::North => Some(Cell::new(pos.row.checked_sub(1)?, pos.col)),
        Direction::South => Some(Cell::new(pos.row + 1, pos.col)),
        Direction::East => Some(Cell::new(pos.row, pos.col + 1)),
        Direction::West => Some(Cell::new(pos.row, pos.col.checked_sub(1)?)),
    }
}

/// Breadth-first search over open passages. Returns the directions of one
/// shortest route from `from` to `to`.
pub fn shortest_path(maze: &Maze, from: Cell, to: Cell) -> Option<Vec<Direction>> {
    let size = maze.size;
    if maze.walls(from).is_none() || maze.walls(to).is_none() {
        return None;
    }
    let mut came_from: Vec<Vec<Option<(Cell, Direction)>>> = vec![vec![None; size]; size];
    let mut seen = vec![vec![false; size]; size];
    let mut queue = VecDeque::new();
    seen[from.row][from.col] = true;
    queue.push_back(from);

    while let Some(cell) = queue.pop_front() {
        if cell == to {
            let mut route = Vec::new();
            let mut cursor = cell;
            while let Some((prev, dir)) = came_from[cursor.row][cursor.col] {
                route.push(dir);
                cursor = prev;
            }
            route.reverse();
            return Some(route);
        }
        for dir in Direction::ALL {
            if !maze.can_move(cell, dir) {
                continue;
            }
            let Some(next) = dir.step(cell, size) else {
                continue;
            };
            if seen[next.row][next.col] {
                continue;
            }
            seen[next.row][next.col] = true;
            came_from[next.row][next.col] = Some((cell, dir));
            queue.push_back(next);
        }
    }
    None
}

pub fn optimal_path_length(maze: &Maze, from: Cell, to: Cell) -> Option<usize> {
    shortest_path(maze, from, to).map(|route| route.len())
}

pub fn score(move_count: usize) -> u32 {
    floor_score(move_count as u64)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MazeMove {
    pub direction: Direction,
    pub position: Cell,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MazeGame {
    pub maze: Maze,
    pub position: Cell,
    /// Server-side only until the maze is solved.
    pub optimal_length: usize,
    pub moves: Vec<MazeMove>,
}

impl MazeGame {
    pub fn new(rng: &mut Rng, size: usize) -> ArenaResult<Self> {
        Self::from_maze(Maze::generate(rng, size)?)
    }

    pub fn from_maze(maze: Maze) -> ArenaResult<Self> {
        let optimal_length = optimal_path_length(&maze, maze.start, maze.goal).ok_or_else(|| {
            ArenaError::Generation("maze goal is unreachable from start".to_string())
        })?;
        Ok(Self {
            position: maze.start,
            optimal_length,
            moves: Vec::new(),
            maze,
        })
    }

    /// Walk one cell. Blocked moves leave the game untouched.
    pub fn step(&mut self, dir: Direction) -> ArenaResult<Cell> {
        if !self.maze.can_move(self.position, dir) {
            return Err(ArenaError::WallBlocked {
                position: self.position,
            });
        }
        let next = apply_move(self.position, dir).ok_or(ArenaError::WallBlocked {
            position: self.position,
        })?;
        self.position = next;
        self.moves.push(MazeMove {
            direction: dir,
            position: next,
        });
        Ok(next)
    }

    pub fn move_count(&self) -> usize {
        self.moves.len()
    }

    pub fn is_solved(&self) -> bool {
        self.position == self.maze.goal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::Rng;
    use proptest::prelude::*;

    #[test]
    fn generated_maze_is_a_spanning_tree() {
        for seed in 0..100u32 {
            let mut rng = Rng::new(seed);
            let maze = Maze::generate(&mut rng, 10).expect("generate");
            assert_eq!(maze.passage_count(), 10 * 10 - 1, "seed={seed}");
        }
    }

    #[test]
    fn walls_are_symmetric_and_border_is_closed() {
        let mut rng = Rng::new(42);
        let maze = Maze::generate(&mut rng, 10).expect("generate");
        for row in 0..maze.size {
            for col in 0..maze.size {
                let cell = Cell::new(row, col);
                let walls = maze.walls(cell).expect("in grid");
                for dir in Direction::ALL {
                    match dir.step(cell, maze.size) {
                        Some(next) => {
                            let other = maze.walls(next).expect("in grid");
                            assert_eq!(walls.has(dir), other.has(dir.opposite()));
                        }
                        None => assert!(walls.has(dir), "border open at {cell} {dir}"),
                    }
                }
            }
        }
    }

    #[test]
    fn every_cell_is_reachable_from_start() {
        let mut rng = Rng::new(8);
        let maze = Maze::generate(&mut rng, 10).expect("generate");
        for row in 0..10 {
            for col in 0..10 {
                assert!(shortest_path(&maze, maze.start, Cell::new(row, col)).is_some());
            }
        }
    }

    #[test]
    fn can_move_respects_walls_and_bounds() {
        let mut rng = Rng::new(3);
        let maze = Maze::generate(&mut rng, 10).expect("generate");
        assert!(!maze.can_move(Cell::new(0, 0), Direction::North));
        assert!(!maze.can_move(Cell::new(0, 0), Direction::West));
        let origin = maze.walls(Cell::new(0, 0)).expect("origin");
        assert_eq!(maze.can_move(Cell::new(0, 0), Direction::East), !origin.east);
        assert_eq!(maze.can_move(Cell::new(0, 0), Direction::South), !origin.south);
        assert!(!maze.can_move(Cell::new(10, 0), Direction::North));
    }

    #[test]
    fn apply_move_uses_fixed_deltas() {
        let pos = Cell::new(3, 3);
        assert_eq!(apply_move(pos, Direction::North), Some(Cell::new(2, 3)));
        assert_eq!(apply_move(pos, Direction::South), Some(Cell::new(4, 3)));
        assert_eq!(apply_move(pos, Direction::East), Some(Cell::new(3, 4)));
        assert_eq!(apply_move(pos, Direction::West), Some(Cell::new(3, 2)));
        assert_eq!(apply_move(Cell::new(0, 0), Direction::North), None);
    }

    #[test]
    fn following_the_shortest_path_wins_in_optimal_moves() {
        let mut rng = Rng::new(21);
        let mut game = MazeGame::new(&mut rng, 10).expect("game");
        let route = shortest_path(&game.maze, game.position, game.maze.goal).expect("route");
        assert_eq!(route.len(), game.optimal_length);
        for dir in route {
            game.step(dir).expect("route only uses open passages");
        }
        assert!(game.is_solved());
        assert_eq!(game.move_count(), game.optimal_length);
        assert!(game.optimal_length >= 18);
    }

    #[test]
    fn blocked_step_leaves_game_untouched() {
        let mut rng = Rng::new(4);
        let mut game = MazeGame::new(&mut rng, 10).expect("game");
        let before = game.clone();
        let err = game.step(Direction::North).expect_err("border wall");
        assert!(matches!(err, ArenaError::WallBlocked { position } if position == Cell::new(0, 0)));
        assert_eq!(game, before);
    }

    #[test]
    fn tiny_mazes_are_rejected() {
        let mut rng = Rng::new(1);
        assert!(matches!(Maze::generate(&mut rng, 1), Err(ArenaError::Generation(_))));
    }

    #[test]
    fn score_is_clamped() {
        assert_eq!(score(18), 83);
        assert_eq!(score(101), 1);
        assert_eq!(score(150), 1);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn any_maze_connects_start_and_goal(seed in any::<u32>(), size in 2usize..16) {
            let mut rng = Rng::new(seed);
            let maze = Maze::generate(&mut rng, size).expect("generate");
            prop_assert_eq!(maze.passage_count(), size * size - 1);
            let length = optimal_path_length(&maze, maze.start, maze.goal);
            prop_assert!(length.is_some());
            prop_assert!(length.unwrap_or(0) >= 2 * (size - 1));
        }
    }
}
