//! Persisted game sessions and the redacted views handed to clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agents::Agent;
use crate::battleship::{fleet, spectator_view, BattleshipGame, FleetEntry, Shot, SpectatorBoard};
use crate::constants::BOARD_SIZE;
use crate::error::{ArenaError, ArenaResult};
use crate::guessing::{GuessRecord, GuessingGame};
use crate::maze::{MazeGame, MazeMove, Walls};
use crate::types::{Cell, GameKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Won,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Won => "won",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" => Some(Self::Active),
            "won" => Some(Self::Won),
            _ => None,
        }
    }

    pub fn ensure_active(self) -> ArenaResult<()> {
        match self {
            Self::Active => Ok(()),
            Self::Won => Err(ArenaError::conflict("game is already finished")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GameState {
    Guessing(GuessingGame),
    Battleship(BattleshipGame),
    Maze(MazeGame),
}

impl GameState {
    pub fn kind(&self) -> GameKind {
        match self {
            Self::Guessing(_) => GameKind::Guessing,
            Self::Battleship(_) => GameKind::Battleship,
            Self::Maze(_) => GameKind::Maze,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSession {
    pub id: String,
    pub agent_id: String,
    pub agent_name: String,
    pub status: SessionStatus,
    pub points: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub game: GameState,
}

impl GameSession {
    pub fn new(id: String, agent: &Agent, game: GameState, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            agent_id: agent.id.clone(),
            agent_name: agent.name.clone(),
            status: SessionStatus::Active,
            points: 0,
            started_at,
            finished_at: None,
            game,
        }
    }

    pub fn kind(&self) -> GameKind {
        self.game.kind()
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// The only transition: `active -> won`, taken once.
    pub fn win(&mut self, points: u32, at: DateTime<Utc>) -> ArenaResult<()> {
        self.status.ensure_active()?;
        self.status = SessionStatus::Won;
        self.points = points;
        self.finished_at = Some(at);
        Ok(())
    }

    pub fn public_view(&self) -> SessionView {
        let won = self.status == SessionStatus::Won;
        let detail = match &self.game {
            GameState::Guessing(game) => SessionDetail::Guessing(GuessingView {
                guesses: game.guesses.clone(),
                guess_count: game.guess_count(),
                target: won.then_some(game.target),
            }),
            GameState::Battleship(game) => SessionDetail::Battleship(BattleshipView {
                shots: game.shots.clone(),
                shot_count: game.shot_count(),
                grid_size: BOARD_SIZE,
                ships: fleet(),
                board: spectator_view(&game.board),
            }),
            GameState::Maze(game) => SessionDetail::Maze(MazeView {
                grid: game.maze.grid.clone(),
                size: game.maze.size,
                start: game.maze.start,
                goal: game.maze.goal,
                position: game.position,
                moves: game.moves.clone(),
                move_count: game.move_count(),
                optimal_length: won.then_some(game.optimal_length),
            }),
        };
        SessionView {
            id: self.id.clone(),
            agent_id: self.agent_id.clone(),
            agent_name: self.agent_name.clone(),
            status: self.status,
            points: self.points,
            started_at: self.started_at,
            finished_at: self.finished_at,
            detail,
        }
    }
}

/// What clients and spectators see of a session. Hidden state (the guessing
/// target, unsunk ships, the optimal maze length) stays out until the game is
/// won.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: String,
    pub agent_id: String,
    pub agent_name: String,
    pub status: SessionStatus,
    pub points: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub detail: SessionDetail,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionDetail {
    Guessing(GuessingView),
    Battleship(BattleshipView),
    Maze(MazeView),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuessingView {
    pub guesses: Vec<GuessRecord>,
    pub guess_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleshipView {
    pub shots: Vec<Shot>,
    pub shot_count: usize,
    pub grid_size: usize,
    /// Roster only; positions are never part of it.
    pub ships: Vec<FleetEntry>,
    #[serde(flatten)]
    pub board: SpectatorBoard,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MazeView {
    pub grid: Vec<Vec<Walls>>,
    pub size: usize,
    pub start: Cell,
    pub goal: Cell,
    pub position: Cell,
    pub moves: Vec<MazeMove>,
    pub move_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimal_length: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::Rng;

    fn owner() -> Agent {
        Agent::new("agent-1".to_string(), "Alice".to_string(), Utc::now())
    }

    fn guessing_session(target: u8) -> GameSession {
        GameSession::new(
            "s-1".to_string(),
            &owner(),
            GameState::Guessing(GuessingGame::with_target(target)),
            Utc::now(),
        )
    }

    #[test]
    fn status_parse_accepts_known_values() {
        assert_eq!(SessionStatus::parse("active"), Some(SessionStatus::Active));
        assert_eq!(SessionStatus::parse(" WON "), Some(SessionStatus::Won));
        assert_eq!(SessionStatus::parse("lost"), None);
    }

    #[test]
    fn win_is_a_single_forward_transition() {
        let mut session = guessing_session(42);
        assert!(session.is_active());
        session.win(71, Utc::now()).expect("first win");
        assert_eq!(session.status, SessionStatus::Won);
        assert_eq!(session.points, 71);
        assert!(session.finished_at.is_some());

        let err = session.win(99, Utc::now()).expect_err("already won");
        assert!(matches!(err, ArenaError::Conflict(_)));
        assert_eq!(session.points, 71);
    }

    #[test]
    fn active_guessing_view_hides_target() {
        let session = guessing_session(42);
        let json = serde_json::to_value(session.public_view()).expect("serialize");
        assert_eq!(json["kind"], "guessing");
        assert_eq!(json["status"], "active");
        assert!(json.get("target").is_none());
        assert_eq!(json["guessCount"], 0);
    }

    #[test]
    fn won_guessing_view_reveals_target() {
        let mut session = guessing_session(42);
        if let GameState::Guessing(game) = &mut session.game {
            game.apply(42);
        }
        session.win(91, Utc::now()).expect("win");
        let json = serde_json::to_value(session.public_view()).expect("serialize");
        assert_eq!(json["target"], 42);
        assert_eq!(json["points"], 91);
    }

    #[test]
    fn battleship_view_lists_roster_without_positions() {
        let mut rng = Rng::new(9);
        let game = BattleshipGame::new(&mut rng).expect("board");
        let session = GameSession::new(
            "s-2".to_string(),
            &owner(),
            GameState::Battleship(game),
            Utc::now(),
        );
        let json = serde_json::to_value(session.public_view()).expect("serialize");
        assert_eq!(json["kind"], "battleship");
        assert_eq!(json["totalShips"], 5);
        assert_eq!(json["shipsRemaining"], 5);
        assert_eq!(json["gridSize"], 10);
        assert_eq!(json["ships"].as_array().map(Vec::len), Some(5));
        assert!(json["ships"][0].get("cells").is_none());
        assert!(json.get("board").is_none());
    }

    #[test]
    fn maze_view_hides_optimal_length_while_active() {
        let mut rng = Rng::new(2);
        let game = MazeGame::new(&mut rng, 10).expect("maze");
        let session =
            GameSession::new("s-3".to_string(), &owner(), GameState::Maze(game), Utc::now());
        let json = serde_json::to_value(session.public_view()).expect("serialize");
        assert_eq!(json["kind"], "maze");
        assert_eq!(json["size"], 10);
        assert_eq!(json["position"], serde_json::json!({"row": 0, "col": 0}));
        assert!(json.get("optimalLength").is_none());
    }

    #[test]
    fn session_record_round_trips_through_json() {
        let mut rng = Rng::new(11);
        let game = MazeGame::new(&mut rng, 6).expect("maze");
        let session =
            GameSession::new("s-4".to_string(), &owner(), GameState::Maze(game), Utc::now());
        let value = serde_json::to_value(&session).expect("serialize");
        assert_eq!(value["game"]["kind"], "maze");
        let back: GameSession = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back, session);
    }
}
