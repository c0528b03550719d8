use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use arcade_server::agents::Agent;
use arcade_server::config::ArenaConfig;
use arcade_server::constants::BOARD_SIZE;
use arcade_server::coordinator::{Coordinator, StepResult};
use arcade_server::guessing::GuessOutcome;
use arcade_server::maze::Maze;
use arcade_server::rng::Rng;
use arcade_server::session::{SessionDetail, SessionView};
use arcade_server::store::MemoryStore;
use arcade_server::strategy::{BinarySearchGuesser, HuntTarget, MazeFollower};
use arcade_server::types::{Cell, GameKind};
use clap::Parser;
use serde::Serialize;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Upper bound on moves in one simulated game before it is reported as stuck.
const MAX_MOVES_PER_GAME: usize = 500;

#[derive(Parser, Debug)]
#[command(author, version, about = "Play the reference strategies against an in-process arena")]
struct Cli {
    /// Games to play per kind.
    #[arg(long, default_value_t = 5)]
    games: usize,
    #[arg(long)]
    seed: Option<u32>,
    /// Restrict the run to one kind: guessing, battleship or maze.
    #[arg(long, value_parser = parse_kind)]
    kind: Option<GameKind>,
    #[arg(long)]
    maze_size: Option<usize>,
    #[arg(long)]
    run_id: Option<String>,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

fn parse_kind(raw: &str) -> Result<GameKind, String> {
    GameKind::parse(&raw.trim().to_ascii_lowercase())
        .ok_or_else(|| format!("unknown game kind `{raw}`"))
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GameResultLine {
    run_id: String,
    kind: GameKind,
    game_index: usize,
    session_id: String,
    moves: usize,
    points: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    optimal_length: Option<usize>,
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct KindSummary {
    games: usize,
    total_moves: usize,
    total_points: u64,
    average_moves: f64,
    average_points: f64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunSummary {
    run_id: String,
    seed: u32,
    failures: usize,
    kinds: BTreeMap<String, KindSummary>,
    games: Vec<GameResultLine>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("arcade_server=warn".parse()?)
                .add_directive("simulate=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let seed = cli.seed.unwrap_or_else(rand::random::<u32>);
    let run_id = cli
        .run_id
        .clone()
        .unwrap_or_else(|| default_run_id(seed));
    let kinds: Vec<GameKind> = match cli.kind {
        Some(kind) => vec![kind],
        None => GameKind::ALL.to_vec(),
    };

    let mut config = ArenaConfig {
        move_cooldown_ms: 0,
        seed: Some(seed),
        ..ArenaConfig::default()
    };
    if let Some(size) = cli.maze_size {
        config.maze_size = size;
    }
    let coordinator = Coordinator::new(Arc::new(MemoryStore::new()), config);
    let agent = coordinator
        .register_agent("Simulator")
        .await
        .context("failed to register simulator agent")?
        .agent;
    let mut strategy_rng = Rng::new(seed ^ 0x9e37_79b9);

    info!(%run_id, seed, games = cli.games, "run started");
    let mut results = Vec::new();
    let mut failures = 0usize;
    for kind in kinds {
        for game_index in 0..cli.games {
            let played = match kind {
                GameKind::Guessing => play_guessing(&coordinator, &agent).await,
                GameKind::Battleship => {
                    play_battleship(&coordinator, &agent, &mut strategy_rng).await
                }
                GameKind::Maze => play_maze(&coordinator, &agent).await,
            };
            match played {
                Ok(outcome) => {
                    let line = GameResultLine {
                        run_id: run_id.clone(),
                        kind,
                        game_index,
                        session_id: outcome.session_id,
                        moves: outcome.moves,
                        points: outcome.points,
                        optimal_length: outcome.optimal_length,
                    };
                    println!("{}", serde_json::to_string(&line)?);
                    results.push(line);
                }
                Err(err) => {
                    failures += 1;
                    error!(%kind, game_index, error = %err, "game failed");
                }
            }
        }
    }

    let summary = build_run_summary(run_id.clone(), seed, failures, results);
    if let Some(path) = cli.summary_out.as_ref() {
        write_summary(path, &summary)
            .with_context(|| format!("failed to write summary to {}", path.display()))?;
    }
    for (kind, stats) in &summary.kinds {
        info!(
            kind = %kind,
            games = stats.games,
            average_moves = stats.average_moves,
            average_points = stats.average_points,
            "kind finished"
        );
    }
    info!(%run_id, failures, "run finished");

    if failures > 0 {
        std::process::exit(1);
    }
    Ok(())
}

struct PlayedGame {
    session_id: String,
    moves: usize,
    points: u32,
    optimal_length: Option<usize>,
}

async fn play_guessing(coordinator: &Coordinator, agent: &Agent) -> anyhow::Result<PlayedGame> {
    let view = coordinator.start_game(agent, GameKind::Guessing).await?;
    let mut guesser = BinarySearchGuesser::default();
    for _ in 0..MAX_MOVES_PER_GAME {
        let Some(guess) = guesser.next_guess() else {
            bail!("guess range exhausted");
        };
        let reply = coordinator.guess(agent, &view.id, guess).await?;
        guesser.record(guess, reply.result);
        if reply.result == GuessOutcome::Correct {
            return Ok(PlayedGame {
                session_id: view.id,
                moves: reply.guess_count,
                points: reply.points.unwrap_or_default(),
                optimal_length: None,
            });
        }
    }
    bail!("guessing game {} did not finish", view.id)
}

async fn play_battleship(
    coordinator: &Coordinator,
    agent: &Agent,
    rng: &mut Rng,
) -> anyhow::Result<PlayedGame> {
    let view = coordinator.start_game(agent, GameKind::Battleship).await?;
    let shots = match &view.detail {
        SessionDetail::Battleship(detail) => detail.shots.clone(),
        _ => bail!("expected a battleship session"),
    };
    let mut hunter = HuntTarget::from_history(rng, BOARD_SIZE, &shots);
    for _ in 0..MAX_MOVES_PER_GAME {
        let Some(cell) = hunter.next_target() else {
            bail!("no cells left to fire at");
        };
        let reply = coordinator
            .fire(agent, &view.id, cell.row as i64, cell.col as i64)
            .await?;
        hunter.record(cell, reply.result);
        if reply.game_over {
            return Ok(PlayedGame {
                session_id: view.id,
                moves: reply.shot_count,
                points: reply.points.unwrap_or_default(),
                optimal_length: None,
            });
        }
    }
    bail!("battleship game {} did not finish", view.id)
}

async fn play_maze(coordinator: &Coordinator, agent: &Agent) -> anyhow::Result<PlayedGame> {
    let view = coordinator.start_game(agent, GameKind::Maze).await?;
    let (maze, position) = revealed_maze(&view)?;
    let mut follower = MazeFollower::plan(&maze, position);
    if follower.remaining() == 0 {
        warn!(session_id = %view.id, "no route from start to goal");
    }
    while let Some(direction) = follower.next_direction() {
        let reply = coordinator.step(agent, &view.id, direction.as_str()).await?;
        if reply.result == StepResult::Win {
            return Ok(PlayedGame {
                session_id: view.id,
                moves: reply.move_count,
                points: reply.points.unwrap_or_default(),
                optimal_length: reply.optimal_length,
            });
        }
    }
    bail!("maze game {} did not finish", view.id)
}

fn revealed_maze(view: &SessionView) -> anyhow::Result<(Maze, Cell)> {
    let SessionDetail::Maze(detail) = &view.detail else {
        bail!("expected a maze session");
    };
    let maze = Maze {
        size: detail.size,
        grid: detail.grid.clone(),
        start: detail.start,
        goal: detail.goal,
    };
    Ok((maze, detail.position))
}

fn default_run_id(seed: u32) -> String {
    format!("sim-{seed}")
}

fn build_run_summary(
    run_id: String,
    seed: u32,
    failures: usize,
    games: Vec<GameResultLine>,
) -> RunSummary {
    let mut kinds: BTreeMap<String, KindSummary> = BTreeMap::new();
    for game in &games {
        let entry = kinds.entry(game.kind.to_string()).or_default();
        entry.games += 1;
        entry.total_moves += game.moves;
        entry.total_points += u64::from(game.points);
    }
    for stats in kinds.values_mut() {
        if stats.games > 0 {
            stats.average_moves = stats.total_moves as f64 / stats.games as f64;
            stats.average_points = stats.total_points as f64 / stats.games as f64;
        }
    }
    RunSummary {
        run_id,
        seed,
        failures,
        kinds,
        games,
    }
}

fn write_summary(path: &Path, summary: &RunSummary) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, text)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(kind: GameKind, moves: usize, points: u32) -> GameResultLine {
        GameResultLine {
            run_id: "sim-1".to_string(),
            kind,
            game_index: 0,
            session_id: "s".to_string(),
            moves,
            points,
            optimal_length: None,
        }
    }

    fn simulator() -> Coordinator {
        let config = ArenaConfig {
            move_cooldown_ms: 0,
            seed: Some(42),
            ..ArenaConfig::default()
        };
        Coordinator::new(Arc::new(MemoryStore::new()), config)
    }

    #[test]
    fn default_run_id_contains_seed() {
        assert_eq!(default_run_id(42), "sim-42");
    }

    #[test]
    fn parse_kind_is_case_insensitive() {
        assert_eq!(parse_kind("Maze"), Ok(GameKind::Maze));
        assert!(parse_kind("chess").is_err());
    }

    #[test]
    fn build_run_summary_averages_per_kind() {
        let summary = build_run_summary(
            "sim-1".to_string(),
            1,
            0,
            vec![
                line(GameKind::Maze, 20, 81),
                line(GameKind::Maze, 30, 71),
                line(GameKind::Guessing, 5, 51),
            ],
        );
        let maze = &summary.kinds["maze"];
        assert_eq!(maze.games, 2);
        assert_eq!(maze.average_moves, 25.0);
        assert_eq!(maze.average_points, 76.0);
        assert_eq!(summary.kinds["guessing"].games, 1);
    }

    #[test]
    fn write_summary_returns_error_when_parent_does_not_exist() {
        let target = std::env::temp_dir()
            .join(format!("arcade-missing-{}", rand::random::<u32>()))
            .join("summary.json");
        let summary = build_run_summary("sim-1".to_string(), 1, 0, Vec::new());
        assert!(write_summary(&target, &summary).is_err());
    }

    #[tokio::test]
    async fn reference_strategies_win_every_kind() {
        let coordinator = simulator();
        let agent = coordinator
            .register_agent("Simulator")
            .await
            .expect("register")
            .agent;
        let mut rng = Rng::new(5);

        let guessing = play_guessing(&coordinator, &agent).await.expect("guessing");
        assert!(guessing.moves <= 7);
        let battleship = play_battleship(&coordinator, &agent, &mut rng)
            .await
            .expect("battleship");
        assert!(battleship.moves >= 17);
        let maze = play_maze(&coordinator, &agent).await.expect("maze");
        assert_eq!(Some(maze.moves), maze.optimal_length);

        let board = coordinator.scoreboard().await.expect("scoreboard");
        assert_eq!(board[0].games_won, 3);
    }
}
