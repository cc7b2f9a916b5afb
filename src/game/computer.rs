use std::time::Duration;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::watch;

use super::game_state::{GameState, Phase};
use super::store::{Applied, GameHandle};
use crate::logger;
use crate::models::board::Seat;

/// A legal move: which card goes where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChosenMove {
    pub card_id: String,
    pub row: usize,
    pub col: usize,
}

/// Uniformly random card from `seat`'s hand onto a uniformly random empty cell, or `None` when
/// it is not that seat's turn.
pub fn choose_move<R: Rng + ?Sized>(state: &GameState, seat: Seat, rng: &mut R) -> Option<ChosenMove> {
    if state.phase != Phase::Playing || state.current_player != seat {
        return None;
    }

    let card = state.player(seat).hand.choose(rng)?;
    let (row, col) = *state.board.empty_cells().choose(rng)?;
    Some(ChosenMove {
        card_id: card.id.clone(),
        row,
        col,
    })
}

/// Baseline opponent: waits a moment, then plays a random legal move whenever it is its turn.
pub struct ComputerOpponent {
    seat: Seat,
    think_min: Duration,
    think_max: Duration,
    rng: ChaCha8Rng,
}

impl ComputerOpponent {
    pub fn new(seat: Seat, think: (Duration, Duration)) -> Self {
        Self::with_rng(seat, think, ChaCha8Rng::from_entropy())
    }

    pub fn with_rng(seat: Seat, (think_min, think_max): (Duration, Duration), rng: ChaCha8Rng) -> Self {
        Self {
            seat,
            think_min,
            think_max: think_max.max(think_min),
            rng,
        }
    }

    /// No thinking delay at all, for headless play.
    pub fn instant(seat: Seat, seed: u64) -> Self {
        Self::with_rng(seat, (Duration::ZERO, Duration::ZERO), ChaCha8Rng::seed_from_u64(seed))
    }

    fn think_time(&mut self) -> Duration {
        if self.think_max.is_zero() {
            return Duration::ZERO;
        }
        let millis = self
            .rng
            .gen_range(self.think_min.as_millis()..=self.think_max.as_millis());
        Duration::from_millis(millis as u64)
    }

    /// Plays one move if it is this seat's turn. Returns what the store applied.
    pub async fn take_turn(&mut self, game: &GameHandle) -> Option<Applied> {
        let seat = self.seat;
        let state = game.snapshot().await;
        let chosen = choose_move(&state, seat, &mut self.rng)?;

        game.select_card(&chosen.card_id).await.ok()?;
        match game.place_card(chosen.row, chosen.col).await {
            Ok(applied) => {
                logger!(
                    DEBUG,
                    "[COMPUTER] {seat} played `{}` at ({}, {})",
                    chosen.card_id,
                    chosen.row,
                    chosen.col
                );
                Some(applied)
            }
            Err(rejection) => {
                logger!(WARN, "[COMPUTER] {seat} move was refused ({rejection})");
                None
            }
        }
    }

    /// Watches the store and moves whenever it is this seat's turn, until the match ends or the
    /// store is dropped.
    pub async fn run(mut self, game: GameHandle) {
        let mut changes: watch::Receiver<u64> = game.subscribe();
        loop {
            let (phase, my_turn) = game
                .inspect(|state| (state.phase, state.phase == Phase::Playing && state.current_player == self.seat))
                .await;

            if phase == Phase::GameOver {
                logger!(DEBUG, "[COMPUTER] {} done, match over", self.seat);
                return;
            }

            if my_turn {
                let delay = self.think_time();
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                // The state may have moved on while thinking; take_turn re-reads it.
                if self.take_turn(&game).await.is_some() {
                    continue;
                }
            }

            if changes.changed().await.is_err() {
                return;
            }
        }
    }
}
