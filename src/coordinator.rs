//! Session lifecycle, caps and the shared per-agent move cooldown.
//!
//! Every move request runs the same pipeline: load the session, check
//! ownership, status and cooldown, validate the payload, let the engine
//! resolve the move, and only then write the last-move timestamp, the agent
//! (on a win) and finally the session. A rejected request writes nothing, and
//! a failed write puts back the records written before it, so the move can be
//! retried.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::agents::{self, Agent, ScoreboardEntry};
use crate::auth;
use crate::battleship::{self, BattleshipGame, ShotOutcome, ShotResult};
use crate::clock::{Clock, SystemClock};
use crate::config::ArenaConfig;
use crate::error::{ArenaError, ArenaResult};
use crate::guessing::{self, GuessOutcome, GuessingGame};
use crate::maze::{self, MazeGame};
use crate::rng::Rng;
use crate::session::{GameSession, GameState, SessionStatus, SessionView};
use crate::store::{self, Namespace, RecordStore};
use crate::types::{Cell, Direction, GameKind};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    #[serde(flatten)]
    pub agent: Agent,
    /// Only ever returned here.
    pub api_key: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionFilter {
    pub agent_id: Option<String>,
    pub status: Option<SessionStatus>,
}

impl SessionFilter {
    fn matches(&self, session: &GameSession) -> bool {
        self.agent_id
            .as_deref()
            .map_or(true, |agent_id| session.agent_id == agent_id)
            && self.status.map_or(true, |status| session.status == status)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuessReply {
    pub result: GuessOutcome,
    pub guess_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FireReply {
    pub result: ShotResult,
    pub shot_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ship: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ship_cells: Option<Vec<Cell>>,
    pub game_over: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_shots: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepResult {
    Moved,
    Win,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReply {
    pub result: StepResult,
    pub position: Cell,
    pub move_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimal_length: Option<usize>,
}

pub struct Coordinator {
    store: Arc<dyn RecordStore>,
    config: ArenaConfig,
    clock: Arc<dyn Clock>,
    rng: Mutex<Rng>,
}

impl Coordinator {
    pub fn new(store: Arc<dyn RecordStore>, config: ArenaConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn RecordStore>,
        config: ArenaConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let rng = match config.seed {
            Some(seed) => Rng::new(seed),
            None => Rng::from_entropy(),
        };
        Self {
            store,
            config,
            clock,
            rng: Mutex::new(rng),
        }
    }

    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    pub async fn register_agent(&self, raw_name: &str) -> ArenaResult<Registration> {
        let name = agents::sanitize_name(raw_name)?;
        let existing: Vec<Agent> = store::fetch_all(self.store(), Namespace::Agents).await?;
        if agents::name_taken(&existing, &name) {
            return Err(ArenaError::conflict("agent name already taken"));
        }

        let agent = Agent::new(Uuid::new_v4().to_string(), name, self.clock.now());
        let api_key = auth::make_api_key();
        store::persist(self.store(), Namespace::Agents, &agent.id, &agent).await?;
        auth::bind_key(self.store(), &api_key, &agent.id).await?;
        info!(agent_id = %agent.id, name = %agent.name, "agent registered");
        Ok(Registration { agent, api_key })
    }

    /// Resolve an `Authorization` header value to its agent.
    pub async fn authenticate(&self, header: Option<&str>) -> ArenaResult<Agent> {
        let api_key = auth::parse_bearer(header)?;
        let agent_id = auth::resolve_key(self.store(), api_key).await?;
        let agent: Option<Agent> = store::fetch(self.store(), Namespace::Agents, &agent_id).await?;
        agent.ok_or(ArenaError::Unauthenticated)
    }

    pub async fn get_agent(&self, agent_id: &str) -> ArenaResult<Agent> {
        let agent: Option<Agent> = store::fetch(self.store(), Namespace::Agents, agent_id).await?;
        agent.ok_or_else(|| ArenaError::NotFound("agent".to_string()))
    }

    pub async fn list_agents(&self) -> ArenaResult<Vec<Agent>> {
        let mut agents: Vec<Agent> = store::fetch_all(self.store(), Namespace::Agents).await?;
        agents.sort_by(|a, b| {
            a.registered_at
                .cmp(&b.registered_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(agents)
    }

    pub async fn scoreboard(&self) -> ArenaResult<Vec<ScoreboardEntry>> {
        let agents: Vec<Agent> = store::fetch_all(self.store(), Namespace::Agents).await?;
        Ok(agents::rank(agents))
    }

    pub async fn start_game(&self, agent: &Agent, kind: GameKind) -> ArenaResult<SessionView> {
        let limit = self.config.active_cap(kind);
        let sessions: Vec<GameSession> =
            store::fetch_all(self.store(), Namespace::Sessions(kind)).await?;
        let active = sessions
            .iter()
            .filter(|session| session.agent_id == agent.id && session.is_active())
            .count();
        if active >= limit {
            debug!(agent_id = %agent.id, %kind, active, limit, "start rejected at cap");
            return Err(ArenaError::Capacity { kind, limit });
        }

        let mut rng = self.next_game_rng();
        let game = match kind {
            GameKind::Guessing => GameState::Guessing(GuessingGame::new(&mut rng)),
            GameKind::Battleship => GameState::Battleship(BattleshipGame::new(&mut rng)?),
            GameKind::Maze => GameState::Maze(MazeGame::new(&mut rng, self.config.maze_size)?),
        };
        let session = GameSession::new(Uuid::new_v4().to_string(), agent, game, self.clock.now());
        store::persist(self.store(), Namespace::Sessions(kind), &session.id, &session).await?;
        info!(agent_id = %agent.id, session_id = %session.id, %kind, "game started");
        Ok(session.public_view())
    }

    pub async fn guess(
        &self,
        agent: &Agent,
        session_id: &str,
        raw_guess: i64,
    ) -> ArenaResult<GuessReply> {
        let (mut session, stamp) = self
            .load_for_move(agent, GameKind::Guessing, session_id)
            .await?;
        let guess = guessing::validate_guess(raw_guess)?;
        let GameState::Guessing(game) = &mut session.game else {
            return Err(kind_mismatch(session_id));
        };

        let result = game.apply(guess);
        let guess_count = game.guess_count();
        let target = game.target;
        let points = match result {
            GuessOutcome::Correct => Some(guessing::score(guess_count)),
            _ => None,
        };
        if let Some(points) = points {
            session.win(points, self.clock.now())?;
        }
        self.commit(&session, stamp).await?;

        Ok(GuessReply {
            result,
            guess_count,
            points,
            target: points.map(|_| target),
        })
    }

    pub async fn fire(
        &self,
        agent: &Agent,
        session_id: &str,
        row: i64,
        col: i64,
    ) -> ArenaResult<FireReply> {
        let (mut session, stamp) = self
            .load_for_move(agent, GameKind::Battleship, session_id)
            .await?;
        let cell = battleship::validate_coordinate(row, col)?;
        let GameState::Battleship(game) = &mut session.game else {
            return Err(kind_mismatch(session_id));
        };
        if game.already_fired(cell) {
            return Err(ArenaError::conflict("already fired at this coordinate"));
        }

        let outcome = game.fire(cell);
        let shot_count = game.shot_count();
        let game_over = game.all_sunk();
        let points = game_over.then(|| battleship::score(shot_count));
        if let Some(points) = points {
            session.win(points, self.clock.now())?;
        }
        self.commit(&session, stamp).await?;

        let result = outcome.result();
        let (ship, ship_cells) = match outcome {
            ShotOutcome::Sunk { ship, cells } => (Some(ship), Some(cells)),
            ShotOutcome::Hit | ShotOutcome::Miss => (None, None),
        };
        Ok(FireReply {
            result,
            shot_count,
            ship,
            ship_cells,
            game_over,
            points,
            total_shots: game_over.then_some(shot_count),
        })
    }

    pub async fn step(
        &self,
        agent: &Agent,
        session_id: &str,
        raw_direction: &str,
    ) -> ArenaResult<StepReply> {
        let (mut session, stamp) = self.load_for_move(agent, GameKind::Maze, session_id).await?;
        let direction = Direction::parse(raw_direction.trim()).ok_or_else(|| {
            ArenaError::validation("direction must be \"north\", \"south\", \"east\", or \"west\"")
        })?;
        let GameState::Maze(game) = &mut session.game else {
            return Err(kind_mismatch(session_id));
        };

        let position = game.step(direction)?;
        let move_count = game.move_count();
        let solved = game.is_solved();
        let optimal_length = game.optimal_length;
        let points = solved.then(|| maze::score(move_count));
        if let Some(points) = points {
            session.win(points, self.clock.now())?;
        }
        self.commit(&session, stamp).await?;

        Ok(StepReply {
            result: if solved { StepResult::Win } else { StepResult::Moved },
            position,
            move_count,
            points,
            optimal_length: solved.then_some(optimal_length),
        })
    }

    /// Redacted sessions of one kind, most recent first.
    pub async fn list_sessions(
        &self,
        kind: GameKind,
        filter: &SessionFilter,
    ) -> ArenaResult<Vec<SessionView>> {
        let mut sessions: Vec<GameSession> =
            store::fetch_all(self.store(), Namespace::Sessions(kind)).await?;
        sessions.retain(|session| filter.matches(session));
        sessions.sort_by(|a, b| {
            b.started_at
                .cmp(&a.started_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(sessions.iter().map(GameSession::public_view).collect())
    }

    pub async fn get_session(&self, kind: GameKind, session_id: &str) -> ArenaResult<SessionView> {
        self.load_session(kind, session_id)
            .await
            .map(|session| session.public_view())
    }

    fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    /// Fresh generator for one game, seeded from the coordinator's stream.
    fn next_game_rng(&self) -> Rng {
        let seed = self
            .rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .next_u32();
        Rng::new(seed)
    }

    async fn load_session(&self, kind: GameKind, session_id: &str) -> ArenaResult<GameSession> {
        let session: Option<GameSession> =
            store::fetch(self.store(), Namespace::Sessions(kind), session_id).await?;
        session.ok_or_else(|| ArenaError::NotFound("game".to_string()))
    }

    /// Checks shared by every move kind, in order: existence, ownership,
    /// status, cooldown. Returns the session and the cooldown reading.
    async fn load_for_move(
        &self,
        agent: &Agent,
        kind: GameKind,
        session_id: &str,
    ) -> ArenaResult<(GameSession, MoveStamp)> {
        let session = self.load_session(kind, session_id).await?;
        if session.agent_id != agent.id {
            return Err(ArenaError::Forbidden);
        }
        session.status.ensure_active()?;
        let stamp = self.check_cooldown(&agent.id).await?;
        Ok((session, stamp))
    }

    async fn check_cooldown(&self, agent_id: &str) -> ArenaResult<MoveStamp> {
        let now_ms = self.clock.now_ms();
        let cooldown = self.config.move_cooldown_ms;
        let last: Option<u64> = store::fetch(self.store(), Namespace::LastMove, agent_id).await?;
        if let Some(last) = last {
            let elapsed = now_ms.saturating_sub(last);
            if elapsed < cooldown {
                let retry_after_secs = (cooldown - elapsed).div_ceil(1000);
                debug!(agent_id, elapsed, retry_after_secs, "move rate limited");
                return Err(ArenaError::RateLimited { retry_after_secs });
            }
        }
        Ok(MoveStamp {
            now_ms,
            previous_ms: last,
        })
    }

    /// Persist an accepted move. The session goes last: until it is stored
    /// the game is still active, so a failure here undoes the timestamp and
    /// the win credit and the client can send the same move again.
    async fn commit(&self, session: &GameSession, stamp: MoveStamp) -> ArenaResult<()> {
        let kind = session.kind();
        store::persist(self.store(), Namespace::LastMove, &session.agent_id, &stamp.now_ms).await?;

        let credited = if session.status == SessionStatus::Won {
            match self.credit_win(session).await {
                Ok(previous) => previous,
                Err(err) => {
                    self.restore_last_move(&session.agent_id, stamp).await;
                    return Err(err);
                }
            }
        } else {
            None
        };

        if let Err(err) =
            store::persist(self.store(), Namespace::Sessions(kind), &session.id, session).await
        {
            if let Some(previous) = &credited {
                self.restore_agent(previous).await;
            }
            self.restore_last_move(&session.agent_id, stamp).await;
            return Err(err.into());
        }

        if credited.is_some() {
            info!(
                agent_id = %session.agent_id,
                session_id = %session.id,
                %kind,
                points = session.points,
                "game won"
            );
        }
        Ok(())
    }

    /// Add a finished game to its agent. Returns the record as it was before,
    /// or `None` when the agent no longer exists.
    async fn credit_win(&self, session: &GameSession) -> ArenaResult<Option<Agent>> {
        let agent: Option<Agent> =
            store::fetch(self.store(), Namespace::Agents, &session.agent_id).await?;
        let Some(previous) = agent else {
            warn!(
                agent_id = %session.agent_id,
                session_id = %session.id,
                "winning agent record missing"
            );
            return Ok(None);
        };
        let mut updated = previous.clone();
        updated.record_win(session.points);
        store::persist(self.store(), Namespace::Agents, &updated.id, &updated).await?;
        Ok(Some(previous))
    }

    async fn restore_agent(&self, previous: &Agent) {
        if let Err(error) =
            store::persist(self.store(), Namespace::Agents, &previous.id, previous).await
        {
            warn!(agent_id = %previous.id, %error, "failed to restore agent after aborted move");
        }
    }

    /// Put back the last-move timestamp. An agent with no earlier move gets
    /// zero, which never falls inside a cooldown window.
    async fn restore_last_move(&self, agent_id: &str, stamp: MoveStamp) {
        let previous = stamp.previous_ms.unwrap_or(0);
        if let Err(error) =
            store::persist(self.store(), Namespace::LastMove, agent_id, &previous).await
        {
            warn!(agent_id, %error, "failed to restore last move after aborted move");
        }
    }
}

/// Clock reading a move was admitted at, plus the agent's last move before it.
#[derive(Clone, Copy, Debug)]
struct MoveStamp {
    now_ms: u64,
    previous_ms: Option<u64>,
}

fn kind_mismatch(session_id: &str) -> ArenaError {
    warn!(session_id, "session record does not match its namespace");
    ArenaError::NotFound("game".to_string())
}
