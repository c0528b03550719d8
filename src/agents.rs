//! Registered agents and the public scoreboard.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::AGENT_NAME_MAX_LEN;
use crate::error::{ArenaError, ArenaResult};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub points: u64,
    pub games_played: u32,
    pub games_won: u32,
    pub registered_at: DateTime<Utc>,
}

impl Agent {
    pub fn new(id: String, name: String, registered_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name,
            points: 0,
            games_played: 0,
            games_won: 0,
            registered_at,
        }
    }

    /// Every game ends in a win, so one completion bumps all three counters.
    pub fn record_win(&mut self, points: u32) {
        self.points += u64::from(points);
        self.games_played += 1;
        self.games_won += 1;
    }
}

/// Trim, reject blanks and cap the length of a requested display name.
pub fn sanitize_name(value: &str) -> ArenaResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ArenaError::validation("name is required"));
    }
    Ok(trimmed.chars().take(AGENT_NAME_MAX_LEN).collect())
}

pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

pub fn name_taken<'a>(agents: impl IntoIterator<Item = &'a Agent>, name: &str) -> bool {
    let key = name_key(name);
    agents.into_iter().any(|agent| name_key(&agent.name) == key)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreboardEntry {
    pub rank: usize,
    pub name: String,
    pub points: u64,
    pub games_played: u32,
    pub games_won: u32,
}

/// Agents with at least one finished game, best first.
pub fn rank(agents: Vec<Agent>) -> Vec<ScoreboardEntry> {
    let mut entries: Vec<Agent> = agents
        .into_iter()
        .filter(|agent| agent.games_played > 0)
        .collect();
    entries.sort_by(compare_standing);
    entries
        .into_iter()
        .enumerate()
        .map(|(index, agent)| ScoreboardEntry {
            rank: index + 1,
            name: agent.name,
            points: agent.points,
            games_played: agent.games_played,
            games_won: agent.games_won,
        })
        .collect()
}

fn compare_standing(a: &Agent, b: &Agent) -> Ordering {
    b.points
        .cmp(&a.points)
        .then_with(|| b.games_won.cmp(&a.games_won))
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
}
