//! Number guessing: a hidden target in `1..=100`, answered with
//! higher/lower hints until the agent names it.

use serde::{Deserialize, Serialize};

use crate::constants::{floor_score, GUESS_MAX, GUESS_MIN};
use crate::error::{ArenaError, ArenaResult};
use crate::rng::Rng;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuessOutcome {
    Correct,
    /// The target is above the guess.
    Higher,
    /// The target is below the guess.
    Lower,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuessRecord {
    pub guess: u8,
    pub result: GuessOutcome,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuessingGame {
    pub target: u8,
    pub guesses: Vec<GuessRecord>,
}

impl GuessingGame {
    pub fn new(rng: &mut Rng) -> Self {
        Self::with_target(new_target(rng))
    }

    pub fn with_target(target: u8) -> Self {
        Self {
            target,
            guesses: Vec::new(),
        }
    }

    /// Record a guess and classify it. The guess must already be validated.
    pub fn apply(&mut self, guess: u8) -> GuessOutcome {
        let result = evaluate(self.target, guess);
        self.guesses.push(GuessRecord { guess, result });
        result
    }

    pub fn guess_count(&self) -> usize {
        self.guesses.len()
    }

    pub fn is_solved(&self) -> bool {
        self.guesses
            .last()
            .map(|record| record.result == GuessOutcome::Correct)
            .unwrap_or(false)
    }
}

pub fn new_target(rng: &mut Rng) -> u8 {
    rng.int(GUESS_MIN as i32, GUESS_MAX as i32) as u8
}

pub fn validate_guess(raw: i64) -> ArenaResult<u8> {
    if !(GUESS_MIN..=GUESS_MAX).contains(&raw) {
        return Err(ArenaError::validation(
            "guess must be an integer between 1 and 100",
        ));
    }
    Ok(raw as u8)
}

pub fn evaluate(target: u8, guess: u8) -> GuessOutcome {
    match guess.cmp(&target) {
        std::cmp::Ordering::Equal => GuessOutcome::Correct,
        std::cmp::Ordering::Less => GuessOutcome::Higher,
        std::cmp::Ordering::Greater => GuessOutcome::Lower,
    }
}

pub fn score(guess_count: usize) -> u32 {
    floor_score((guess_count as u64).saturating_mul(10))
}
