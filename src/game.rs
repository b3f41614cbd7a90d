use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::ai::eval::Evaluator;
use crate::ai::search::HeuristicSelector;
use crate::board::{Board, CHECKERS_PER_SIDE, Move, Source, Target};
use crate::config::{ConfigError, MatchConfig};
use crate::cube::{Cube, should_offer_double, should_take_double};
use crate::dice::{DiceRoller, Roll, SeededDice};
use crate::error::EngineError;
use crate::matchplay::{GameOutcome, MatchClock, MatchState};
use crate::sequence::{MoveSequence, enumerate, playable_moves};
use crate::types::{Color, CubeView, GameStateView, PipCounts, ScoreView};

pub const HUMAN: Color = Color::White;
pub const COMPUTER: Color = Color::Black;
const LOG_LINES: usize = 5;

/// Chooses the computer's full-turn play.
pub trait SequenceSelector: Send + Sync {
    fn select_sequence(&self, board: &Board, color: Color, dice: &[u8]) -> MoveSequence;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FirstSequenceSelector;

impl SequenceSelector for FirstSequenceSelector {
    fn select_sequence(&self, board: &Board, color: Color, dice: &[u8]) -> MoveSequence {
        enumerate(board, color, dice)
            .into_iter()
            .next()
            .unwrap_or(MoveSequence {
                moves: Vec::new(),
                result: *board,
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayedMove {
    pub mv: Move,
    before: Board,
    remaining_before: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnStage {
    AwaitingRoll,
    /// The side whose turn it is has offered a double and waits for an answer.
    DoubleOffered,
    Moving {
        roll: Roll,
        remaining: Vec<u8>,
        played: Vec<PlayedMove>,
        /// Computer moves chosen but not yet shown.
        queued: VecDeque<Move>,
    },
}

impl TurnStage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AwaitingRoll => "awaiting-roll",
            Self::DoubleOffered => "double-offered",
            Self::Moving { .. } => "moving",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub player: Color,
    pub stage: TurnStage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    PreMatch,
    /// Waiting for the opening roll that decides who starts.
    Opening,
    Playing(Turn),
    Ended(GameOutcome),
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PreMatch => "pre-match",
            Self::Opening => "opening",
            Self::Playing(_) => "playing",
            Self::Ended(_) => "ended",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContinuationKind {
    AutoPass,
    ComputerTurn,
    ComputerRoll,
    ComputerPlay,
    ComputerStep,
    DoubleResponse,
    NextGame,
}

/// Deferred engine step. The host waits `delay_ms`, then hands it back to
/// [`Engine::resume`]; anything but the current pending continuation is
/// ignored. `seq` is unique per scheduling, so a timer fired twice only
/// runs once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Continuation {
    pub epoch: u64,
    pub seq: u64,
    pub kind: ContinuationKind,
    pub delay_ms: u32,
}

/// Single match against the computer. White is the player, black the
/// computer.
pub struct Engine {
    config: MatchConfig,
    board: Board,
    cube: Cube,
    phase: Phase,
    score: MatchState,
    epoch: u64,
    scheduled: u64,
    pending: Option<Continuation>,
    log: VecDeque<String>,
    dice: Box<dyn DiceRoller>,
    selector: Box<dyn SequenceSelector>,
}

impl Engine {
    pub fn new(
        config: MatchConfig,
        dice: Box<dyn DiceRoller>,
        selector: Box<dyn SequenceSelector>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            board: Board::new(),
            cube: Cube::new(),
            phase: Phase::PreMatch,
            score: MatchState::new(&config),
            epoch: 0,
            scheduled: 0,
            pending: None,
            log: VecDeque::with_capacity(LOG_LINES),
            dice,
            selector,
        })
    }

    /// Seeded dice and the heuristic computer opponent.
    pub fn with_seed(config: MatchConfig, seed: u64) -> Result<Self, ConfigError> {
        let timeout = Duration::from_millis(config.ai.search_timeout_ms);
        Self::new(
            config,
            Box::new(SeededDice::new(seed)),
            Box::new(HeuristicSelector::new(Evaluator::default(), timeout)),
        )
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn cube(&self) -> &Cube {
        &self.cube
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn score(&self) -> &MatchState {
        &self.score
    }

    pub fn pending(&self) -> Option<Continuation> {
        self.pending
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Swaps the computer opponent, e.g. after loading an evaluator profile.
    pub fn set_selector(&mut self, selector: Box<dyn SequenceSelector>) {
        self.selector = selector;
    }

    /// Discards the current match and waits for [`Engine::start_match`].
    #[instrument(skip(self), level = "debug")]
    pub fn new_match(&mut self, config: MatchConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.config = config;
        self.score = MatchState::new(&config);
        self.epoch += 1;
        self.pending = None;
        self.board = Board::new();
        self.cube = Cube::new();
        self.phase = Phase::PreMatch;
        self.log.clear();
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    pub fn start_match(&mut self) -> Result<(), EngineError> {
        if self.phase != Phase::PreMatch {
            return Err(rejected(EngineError::WrongPhase(self.phase.name())));
        }
        let target = self.score.target();
        self.log(format!(
            "Match to {target} point{} started",
            if target == 1 { "" } else { "s" }
        ));
        info!(target_score = target, "match started");
        self.new_game();
        Ok(())
    }

    /// Opening roll while the game is in `opening`, otherwise the player's
    /// regular roll.
    #[instrument(skip(self), level = "debug")]
    pub fn roll(&mut self) -> Result<Roll, EngineError> {
        if self.phase == Phase::Opening {
            return Ok(self.opening_roll());
        }
        let stage = self.human_stage().map_err(rejected)?;
        if !matches!(stage, TurnStage::AwaitingRoll) {
            return Err(rejected(EngineError::WrongPhase(stage.name())));
        }

        let roll = self.dice.roll();
        let [a, b] = roll.values;
        self.log(format!("You rolled {a}-{b}"));
        debug!(a, b, "player rolled");
        self.begin_moving(HUMAN, roll);
        self.after_human_roll();
        Ok(roll)
    }

    /// Plays the player's checker from `from` to `to`. When several dice
    /// reach the same destination the smallest one is used.
    #[instrument(skip(self), level = "debug")]
    pub fn play(&mut self, from: Source, to: Target) -> Result<Move, EngineError> {
        self.human_stage().map_err(rejected)?;
        let mv = self
            .legal_moves()
            .into_iter()
            .filter(|mv| mv.from == from && mv.to == to)
            .min_by_key(|mv| mv.die)
            .ok_or_else(|| rejected(EngineError::IllegalMove(Move::new(from, to, 0))))?;
        self.apply_human(mv)
    }

    /// Highest-die move the player may make from `from`.
    pub fn best_move_from(&self, from: Source) -> Option<Move> {
        self.legal_moves()
            .into_iter()
            .filter(|mv| mv.from == from)
            .max_by_key(|mv| mv.die)
    }

    #[instrument(skip(self), level = "debug")]
    pub fn play_from(&mut self, from: Source) -> Result<Move, EngineError> {
        self.human_stage().map_err(rejected)?;
        let mv = self
            .best_move_from(from)
            .ok_or_else(|| rejected(EngineError::NoMoveFrom(from)))?;
        self.apply_human(mv)
    }

    /// Contract:
    /// - Player's turn after the roll: every move `play` accepts next.
    /// - Otherwise: empty.
    pub fn legal_moves(&self) -> Vec<Move> {
        match &self.phase {
            Phase::Playing(Turn {
                player,
                stage: TurnStage::Moving { remaining, .. },
            }) if *player == HUMAN => playable_moves(&self.board, HUMAN, remaining),
            _ => Vec::new(),
        }
    }

    pub fn can_undo(&self) -> bool {
        matches!(
            &self.phase,
            Phase::Playing(Turn {
                player,
                stage: TurnStage::Moving { played, .. },
            }) if *player == HUMAN && !played.is_empty()
        )
    }

    /// Takes back the player's last move of this turn.
    #[instrument(skip(self), level = "debug")]
    pub fn undo(&mut self) -> Result<Move, EngineError> {
        let undone = match &mut self.phase {
            Phase::Playing(Turn {
                player,
                stage: TurnStage::Moving {
                    remaining, played, ..
                },
            }) if *player == HUMAN => played.pop().map(|last| {
                *remaining = last.remaining_before;
                (last.mv, last.before)
            }),
            _ => None,
        };
        let Some((mv, before)) = undone else {
            return Err(rejected(EngineError::NothingToUndo));
        };

        self.board = before;
        self.pending = None;
        debug!(%mv, "move undone");
        Ok(mv)
    }

    /// Ends the player's turn once no die can be played.
    #[instrument(skip(self), level = "debug")]
    pub fn confirm_turn(&mut self) -> Result<(), EngineError> {
        let stage = self.human_stage().map_err(rejected)?;
        if !matches!(stage, TurnStage::Moving { .. }) {
            return Err(rejected(EngineError::WrongPhase(stage.name())));
        }
        if !self.legal_moves().is_empty() {
            return Err(rejected(EngineError::TurnNotFinished));
        }
        self.pending = None;
        self.pass_turn();
        Ok(())
    }

    /// `side` may double now: its turn, before rolling, with cube access,
    /// outside the Crawford game, and not moot for the match score.
    pub fn can_double(&self, side: Color) -> bool {
        let before_roll = matches!(
            &self.phase,
            Phase::Playing(Turn {
                player,
                stage: TurnStage::AwaitingRoll,
            }) if *player == side
        );
        before_roll
            && self.cube.available_to(side, self.config.ai.max_cube)
            && !self.score.is_crawford_game()
            && !self.score.doubling_is_moot(self.cube.value())
    }

    #[instrument(skip(self), level = "debug")]
    pub fn offer_double(&mut self) -> Result<(), EngineError> {
        let stage = self.human_stage().map_err(rejected)?;
        if !matches!(stage, TurnStage::AwaitingRoll) {
            return Err(rejected(EngineError::WrongPhase(stage.name())));
        }
        if !self.can_double(HUMAN) {
            return Err(rejected(EngineError::DoubleNotAllowed));
        }

        self.phase = Phase::Playing(Turn {
            player: HUMAN,
            stage: TurnStage::DoubleOffered,
        });
        let proposed = self.cube.value() * 2;
        self.log(format!("You offered a double to {proposed}"));
        info!(proposed, "player doubled");
        self.schedule(
            ContinuationKind::DoubleResponse,
            self.config.pacing.double_response,
        );
        Ok(())
    }

    /// Answers the computer's double.
    #[instrument(skip(self), level = "debug")]
    pub fn respond_double(&mut self, take: bool) -> Result<(), EngineError> {
        match &self.phase {
            Phase::Playing(Turn {
                player,
                stage: TurnStage::DoubleOffered,
            }) if *player == COMPUTER => {}
            Phase::Playing(Turn { player, .. }) if *player == HUMAN => {
                return Err(rejected(EngineError::NotYourTurn));
            }
            Phase::Playing(turn) => {
                return Err(rejected(EngineError::WrongPhase(turn.stage.name())));
            }
            other => return Err(rejected(EngineError::WrongPhase(other.name()))),
        }

        if take {
            self.cube.take(HUMAN);
            self.log(format!("You accepted. Cube is at {}", self.cube.value()));
            info!(value = self.cube.value(), "player took");
            self.phase = Phase::Playing(Turn {
                player: COMPUTER,
                stage: TurnStage::AwaitingRoll,
            });
            self.start_grace();
            self.schedule(
                ContinuationKind::ComputerRoll,
                self.config.pacing.post_take_roll,
            );
        } else {
            self.log("You declined the double".to_string());
            self.finish_game(GameOutcome::cube_dropped(COMPUTER, self.cube.value()));
        }
        Ok(())
    }

    /// One second of match time. Returns `true` when the side to act ran out
    /// of time and lost the game.
    pub fn tick(&mut self) -> bool {
        let active = match &self.phase {
            Phase::Playing(turn) if !matches!(turn.stage, TurnStage::DoubleOffered) => {
                turn.player
            }
            _ => return false,
        };
        let Some(clock) = self.score.clock_mut() else {
            return false;
        };
        if !clock.tick(active) {
            return false;
        }

        self.log(format!("{} ran out of time", side_label(active)));
        self.finish_game(GameOutcome::time_forfeit(
            active.opponent(),
            self.cube.value(),
        ));
        true
    }

    /// Runs a scheduled continuation. Returns `false` for stale or unknown
    /// continuations, which change nothing.
    #[instrument(skip(self), level = "debug")]
    pub fn resume(&mut self, continuation: Continuation) -> bool {
        if continuation.epoch != self.epoch || self.pending != Some(continuation) {
            debug!("stale continuation ignored");
            return false;
        }
        self.pending = None;

        match continuation.kind {
            ContinuationKind::AutoPass => self.pass_turn(),
            ContinuationKind::ComputerTurn => self.computer_turn(true),
            ContinuationKind::ComputerRoll => self.computer_turn(false),
            ContinuationKind::ComputerPlay => self.computer_play(),
            ContinuationKind::ComputerStep => self.computer_step(),
            ContinuationKind::DoubleResponse => self.double_response(),
            ContinuationKind::NextGame => self.new_game(),
        }
        true
    }

    pub fn state(&self) -> GameStateView {
        let (current_player, dice, moves_remaining) = match &self.phase {
            Phase::Playing(turn) => match &turn.stage {
                TurnStage::Moving {
                    roll, remaining, ..
                } => (Some(turn.player), roll.values, remaining.clone()),
                _ => (Some(turn.player), [0, 0], Vec::new()),
            },
            _ => (None, [0, 0], Vec::new()),
        };
        let offered = matches!(
            &self.phase,
            Phase::Playing(Turn {
                stage: TurnStage::DoubleOffered,
                ..
            })
        );
        let outcome = match &self.phase {
            Phase::Ended(outcome) => Some(*outcome),
            _ => None,
        };

        GameStateView {
            phase: self.phase.name(),
            current_player,
            dice,
            moves_remaining,
            position: self.board.to_view(),
            pips: PipCounts {
                white: self.board.pip_count(Color::White),
                black: self.board.pip_count(Color::Black),
            },
            cube: CubeView {
                value: self.cube.value(),
                owner: self.cube.owner(),
                offered,
            },
            can_double: self.can_double(HUMAN),
            legal_moves: self.legal_moves(),
            can_undo: self.can_undo(),
            outcome,
            score: ScoreView {
                target_score: self.score.target(),
                player_score: self.score.score(HUMAN),
                computer_score: self.score.score(COMPUTER),
                crawford: self.score.crawford_status(),
                match_winner: self.score.winner(),
            },
            clock: self.score.clock().map(MatchClock::to_view),
            pending: self.pending,
            log: self.log.iter().cloned().collect(),
        }
    }

    fn human_stage(&self) -> Result<&TurnStage, EngineError> {
        match &self.phase {
            Phase::Playing(turn) if turn.player == HUMAN => Ok(&turn.stage),
            Phase::Playing(_) => Err(EngineError::NotYourTurn),
            other => Err(EngineError::WrongPhase(other.name())),
        }
    }

    fn new_game(&mut self) {
        self.epoch += 1;
        self.pending = None;
        self.board = Board::new();
        self.cube = Cube::new();
        self.phase = Phase::Opening;
        if self.score.is_crawford_game() {
            self.log("Crawford game: no doubling".to_string());
        }
        info!(epoch = self.epoch, "new game");
    }

    fn opening_roll(&mut self) -> Roll {
        let roll = self.dice.roll_distinct();
        let [human, computer] = roll.values;
        let starter = if human > computer { HUMAN } else { COMPUTER };
        self.log(format!(
            "Opening roll: you {human}, computer {computer}. {} start{}",
            side_label(starter),
            if starter == HUMAN { "" } else { "s" }
        ));
        info!(human, computer, starter = %starter, "opening roll");

        self.begin_moving(starter, roll);
        if starter == HUMAN {
            self.after_human_roll();
        } else {
            self.schedule(
                ContinuationKind::ComputerPlay,
                self.config.pacing.computer_think,
            );
        }
        roll
    }

    fn begin_moving(&mut self, player: Color, roll: Roll) {
        self.phase = Phase::Playing(Turn {
            player,
            stage: TurnStage::Moving {
                roll,
                remaining: roll.moves(),
                played: Vec::new(),
                queued: VecDeque::new(),
            },
        });
        self.start_grace();
    }

    fn after_human_roll(&mut self) {
        if self.legal_moves().is_empty() {
            self.log("You have no legal moves".to_string());
            info!("player cannot move");
            self.schedule(ContinuationKind::AutoPass, self.config.pacing.auto_pass);
        }
    }

    fn apply_human(&mut self, mv: Move) -> Result<Move, EngineError> {
        let before = self.board;
        self.board.apply(HUMAN, mv).map_err(rejected)?;
        self.record_move(mv, before);
        debug!(%mv, "player moved");

        if self.board.borne_off(HUMAN) == CHECKERS_PER_SIDE {
            self.finish_game(GameOutcome::borne_off(
                &self.board,
                HUMAN,
                self.cube.value(),
            ));
        } else if self.legal_moves().is_empty() {
            self.schedule(ContinuationKind::AutoPass, self.config.pacing.auto_pass);
        }
        Ok(mv)
    }

    fn record_move(&mut self, mv: Move, before: Board) {
        if let Phase::Playing(Turn {
            stage: TurnStage::Moving {
                remaining, played, ..
            },
            ..
        }) = &mut self.phase
        {
            let remaining_before = remaining.clone();
            if let Some(idx) = remaining.iter().position(|&die| die == mv.die) {
                remaining.remove(idx);
            }
            played.push(PlayedMove {
                mv,
                before,
                remaining_before,
            });
        }
    }

    fn pass_turn(&mut self) {
        let Phase::Playing(turn) = &self.phase else {
            return;
        };
        let player = turn.player;
        let summary = match &turn.stage {
            TurnStage::Moving { played, .. } => played
                .iter()
                .map(|played| played.mv.to_string())
                .collect::<Vec<_>>()
                .join(" "),
            _ => String::new(),
        };
        if !summary.is_empty() {
            self.log(format!("{} moved: {summary}", side_label(player)));
        }

        let next = player.opponent();
        self.phase = Phase::Playing(Turn {
            player: next,
            stage: TurnStage::AwaitingRoll,
        });
        self.start_grace();
        info!(from = %player, to = %next, "turn passed");

        if next == COMPUTER {
            self.schedule(
                ContinuationKind::ComputerTurn,
                self.config.pacing.computer_think,
            );
        }
    }

    fn computer_turn(&mut self, consider_double: bool) {
        let awaiting = matches!(
            &self.phase,
            Phase::Playing(Turn {
                player,
                stage: TurnStage::AwaitingRoll,
            }) if *player == COMPUTER
        );
        if !awaiting {
            return;
        }

        if consider_double
            && self.can_double(COMPUTER)
            && should_offer_double(
                self.board.pip_count(COMPUTER),
                self.board.pip_count(HUMAN),
                &self.cube,
                &self.config.ai,
            )
        {
            self.phase = Phase::Playing(Turn {
                player: COMPUTER,
                stage: TurnStage::DoubleOffered,
            });
            let proposed = self.cube.value() * 2;
            self.log(format!("Computer offers a double to {proposed}"));
            info!(proposed, "computer doubled");
            return;
        }

        let roll = self.dice.roll();
        let [a, b] = roll.values;
        self.log(format!("Computer rolled {a}-{b}"));
        debug!(a, b, "computer rolled");
        self.begin_moving(COMPUTER, roll);
        self.schedule(
            ContinuationKind::ComputerPlay,
            self.config.pacing.computer_step,
        );
    }

    fn computer_play(&mut self) {
        let dice = match &self.phase {
            Phase::Playing(Turn {
                player,
                stage: TurnStage::Moving { remaining, .. },
            }) if *player == COMPUTER => remaining.clone(),
            _ => return,
        };

        let seq = self.selector.select_sequence(&self.board, COMPUTER, &dice);
        if seq.moves.is_empty() {
            self.log("Computer has no legal moves".to_string());
            info!("computer cannot move");
            self.schedule(ContinuationKind::AutoPass, self.config.pacing.auto_pass);
            return;
        }
        debug!(moves = seq.moves.len(), "computer chose a sequence");
        self.set_queue(seq.moves.into());
        self.computer_step();
    }

    fn computer_step(&mut self) {
        let (next, remaining) = match &mut self.phase {
            Phase::Playing(Turn {
                player,
                stage: TurnStage::Moving {
                    remaining, queued, ..
                },
            }) if *player == COMPUTER => (queued.pop_front(), remaining.clone()),
            _ => return,
        };
        let Some(mut mv) = next else {
            self.pass_turn();
            return;
        };

        // Selector output is re-checked like any other move.
        if !playable_moves(&self.board, COMPUTER, &remaining).contains(&mv) {
            warn!(%mv, "discarding unplayable computer move");
            let mut fallback: VecDeque<Move> = FirstSequenceSelector
                .select_sequence(&self.board, COMPUTER, &remaining)
                .moves
                .into();
            let Some(first) = fallback.pop_front() else {
                self.pass_turn();
                return;
            };
            self.set_queue(fallback);
            mv = first;
        }

        let before = self.board;
        if let Err(err) = self.board.apply(COMPUTER, mv) {
            warn!(%err, "computer move failed");
            self.pass_turn();
            return;
        }
        self.record_move(mv, before);
        debug!(%mv, "computer moved");

        if self.board.borne_off(COMPUTER) == CHECKERS_PER_SIDE {
            self.finish_game(GameOutcome::borne_off(
                &self.board,
                COMPUTER,
                self.cube.value(),
            ));
            return;
        }

        let more = matches!(
            &self.phase,
            Phase::Playing(Turn {
                stage: TurnStage::Moving { queued, .. },
                ..
            }) if !queued.is_empty()
        );
        if more {
            self.schedule(
                ContinuationKind::ComputerStep,
                self.config.pacing.computer_step,
            );
        } else {
            self.pass_turn();
        }
    }

    fn set_queue(&mut self, moves: VecDeque<Move>) {
        if let Phase::Playing(Turn {
            stage: TurnStage::Moving { queued, .. },
            ..
        }) = &mut self.phase
        {
            *queued = moves;
        }
    }

    fn double_response(&mut self) {
        let offered = matches!(
            &self.phase,
            Phase::Playing(Turn {
                player,
                stage: TurnStage::DoubleOffered,
            }) if *player == HUMAN
        );
        if !offered {
            return;
        }

        let take = should_take_double(
            self.board.pip_count(COMPUTER),
            self.board.pip_count(HUMAN),
            &self.config.ai,
        );
        if take {
            self.cube.take(COMPUTER);
            self.log(format!(
                "Computer accepts. Cube is at {}",
                self.cube.value()
            ));
            info!(value = self.cube.value(), "computer took");
            self.phase = Phase::Playing(Turn {
                player: HUMAN,
                stage: TurnStage::AwaitingRoll,
            });
            self.start_grace();
        } else {
            self.log("Computer declines the double".to_string());
            self.finish_game(GameOutcome::cube_dropped(HUMAN, self.cube.value()));
        }
    }

    fn finish_game(&mut self, outcome: GameOutcome) {
        self.pending = None;
        self.phase = Phase::Ended(outcome);
        let match_winner = self.score.record(&outcome);

        self.log(format!(
            "{} won: {} ({} point{})",
            side_label(outcome.winner),
            outcome.kind.label(),
            outcome.points,
            if outcome.points == 1 { "" } else { "s" }
        ));
        info!(
            winner = %outcome.winner,
            kind = outcome.kind.label(),
            points = outcome.points,
            "game over"
        );

        match match_winner {
            Some(winner) => {
                self.log(format!(
                    "{} won the match {}-{}",
                    side_label(winner),
                    self.score.score(winner),
                    self.score.score(winner.opponent())
                ));
                info!(winner = %winner, "match over");
            }
            None => self.schedule(ContinuationKind::NextGame, self.config.pacing.next_game),
        }
    }

    fn start_grace(&mut self) {
        if let Some(clock) = self.score.clock_mut() {
            clock.start_grace();
        }
    }

    fn schedule(&mut self, kind: ContinuationKind, delay_ms: u32) {
        self.scheduled += 1;
        let continuation = Continuation {
            epoch: self.epoch,
            seq: self.scheduled,
            kind,
            delay_ms,
        };
        debug!(?continuation, "continuation scheduled");
        self.pending = Some(continuation);
    }

    fn log(&mut self, line: String) {
        if self.log.len() == LOG_LINES {
            self.log.pop_front();
        }
        self.log.push_back(line);
    }

    #[cfg(test)]
    fn set_position_for_test(&mut self, board: Board, player: Color) {
        self.board = board;
        self.pending = None;
        self.phase = Phase::Playing(Turn {
            player,
            stage: TurnStage::AwaitingRoll,
        });
        if player == COMPUTER {
            self.schedule(
                ContinuationKind::ComputerTurn,
                self.config.pacing.computer_think,
            );
        }
    }
}

fn side_label(color: Color) -> &'static str {
    if color == HUMAN { "You" } else { "Computer" }
}

fn rejected(err: EngineError) -> EngineError {
    warn!(%err, "command rejected");
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cube::CubeOwner;
    use crate::dice::ScriptedDice;
    use crate::matchplay::WinKind;
    use crate::types::SideCounts;

    fn engine_with(config: MatchConfig, dice: &[u8]) -> Engine {
        Engine::new(
            config,
            Box::new(ScriptedDice::new(dice.to_vec())),
            Box::new(FirstSequenceSelector),
        )
        .unwrap()
    }

    fn match_to(target: u32) -> MatchConfig {
        MatchConfig {
            target_score: target,
            ..MatchConfig::default()
        }
    }

    fn started(dice: &[u8]) -> Engine {
        let mut engine = engine_with(MatchConfig::default(), dice);
        engine.start_match().unwrap();
        engine
    }

    fn pending_kind(engine: &Engine) -> Option<ContinuationKind> {
        engine.pending().map(|c| c.kind)
    }

    fn run_pending(engine: &mut Engine) -> bool {
        match engine.pending() {
            Some(continuation) => engine.resume(continuation),
            None => false,
        }
    }

    fn board(points: &[(u8, Color, u8)], bar: SideCounts, off: SideCounts) -> Board {
        Board::from_points(points, bar, off).unwrap()
    }

    fn pt(point: u8) -> Source {
        Source::Point(point)
    }

    fn to(point: u8) -> Target {
        Target::Point(point)
    }

    #[test]
    fn initial_state_is_pre_match() {
        let engine = engine_with(MatchConfig::default(), &[3, 1]);
        let state = engine.state();

        assert_eq!(state.phase, "pre-match");
        assert_eq!(state.current_player, None);
        assert!(state.legal_moves.is_empty());
        assert_eq!(state.pips.white, 167);
        assert_eq!(state.cube.value, 1);
        assert!(state.pending.is_none());
    }

    #[test]
    fn new_engine_rejects_invalid_config() {
        let result = Engine::new(
            match_to(4),
            Box::new(ScriptedDice::default()),
            Box::new(FirstSequenceSelector),
        );

        assert!(matches!(result, Err(ConfigError::MatchLength(4))));
    }

    #[test]
    fn opening_roll_gives_higher_die_the_first_move() {
        let mut engine = started(&[3, 1]);
        assert_eq!(engine.state().phase, "opening");

        let roll = engine.roll().unwrap();
        let state = engine.state();

        assert_eq!(roll, Roll::new(3, 1));
        assert_eq!(state.current_player, Some(HUMAN));
        assert_eq!(state.dice, [3, 1]);
        assert_eq!(state.moves_remaining, vec![3, 1]);
        assert!(!state.legal_moves.is_empty());
    }

    #[test]
    fn playing_eight_five_six_five_makes_the_five_point() {
        let mut engine = started(&[3, 1]);
        engine.roll().unwrap();

        let first = engine.play(pt(8), to(5)).unwrap();
        let second = engine.play(pt(6), to(5)).unwrap();

        assert_eq!(first.die, 3);
        assert_eq!(second.die, 1);
        assert_eq!(engine.board().occupant(5), Some((Color::White, 2)));
        assert_eq!(engine.board().count(Color::White, 8), 2);
        assert_eq!(engine.board().count(Color::White, 6), 4);
        assert_eq!(
            engine.pending(),
            Some(Continuation {
                epoch: 1,
                seq: 1,
                kind: ContinuationKind::AutoPass,
                delay_ms: 1000,
            })
        );

        assert!(run_pending(&mut engine));
        assert_eq!(engine.state().current_player, Some(COMPUTER));
        assert_eq!(pending_kind(&engine), Some(ContinuationKind::ComputerTurn));
        assert!(engine.state().log.iter().any(|line| line == "You moved: 8/5 6/5"));
    }

    #[test]
    fn illegal_move_is_rejected_without_mutation() {
        let mut engine = started(&[3, 1]);
        engine.roll().unwrap();
        let before = engine.state();

        let err = engine.play(pt(6), to(1)).unwrap_err();

        assert!(matches!(err, EngineError::IllegalMove(_)));
        assert_eq!(engine.state(), before);
    }

    #[test]
    fn undo_restores_board_and_dice() {
        let mut engine = started(&[3, 1]);
        engine.roll().unwrap();
        engine.play(pt(8), to(5)).unwrap();
        engine.play(pt(6), to(5)).unwrap();
        assert!(engine.pending().is_some());

        engine.undo().unwrap();
        assert!(engine.pending().is_none());
        assert_eq!(engine.state().moves_remaining, vec![1]);

        engine.undo().unwrap();
        assert_eq!(*engine.board(), Board::new());
        assert_eq!(engine.state().moves_remaining, vec![3, 1]);
        assert!(!engine.can_undo());
        assert_eq!(engine.undo(), Err(EngineError::NothingToUndo));
    }

    #[test]
    fn confirm_turn_requires_finished_dice() {
        let mut engine = started(&[3, 1]);
        engine.roll().unwrap();
        engine.play(pt(8), to(5)).unwrap();

        assert_eq!(engine.confirm_turn(), Err(EngineError::TurnNotFinished));

        engine.play(pt(6), to(5)).unwrap();
        engine.confirm_turn().unwrap();

        assert_eq!(engine.state().current_player, Some(COMPUTER));
        assert_eq!(pending_kind(&engine), Some(ContinuationKind::ComputerTurn));
    }

    #[test]
    fn play_from_uses_highest_die() {
        let mut engine = started(&[3, 1]);
        engine.roll().unwrap();

        assert_eq!(
            engine.best_move_from(pt(13)),
            Some(Move::new(pt(13), to(10), 3))
        );
        assert_eq!(engine.play_from(pt(13)).unwrap().to, to(10));
        assert_eq!(
            engine.play_from(pt(20)),
            Err(EngineError::NoMoveFrom(pt(20)))
        );
    }

    #[test]
    fn computer_wins_opening_and_plays_step_by_step() {
        let mut engine = started(&[1, 4]);
        engine.roll().unwrap();

        assert_eq!(engine.state().current_player, Some(COMPUTER));
        assert!(engine.state().legal_moves.is_empty());
        assert_eq!(
            engine.pending(),
            Some(Continuation {
                epoch: 1,
                seq: 1,
                kind: ContinuationKind::ComputerPlay,
                delay_ms: 1200,
            })
        );
        assert_eq!(engine.roll(), Err(EngineError::NotYourTurn));

        assert!(run_pending(&mut engine));
        assert_eq!(pending_kind(&engine), Some(ContinuationKind::ComputerStep));
        assert!(run_pending(&mut engine));

        let state = engine.state();
        assert_eq!(state.current_player, Some(HUMAN));
        assert_eq!(state.pips.black, 167 - 5);
        assert!(engine.board().is_conserved(Color::Black));
        assert!(state.log.iter().any(|line| line.starts_with("Computer moved: ")));
        assert!(engine.pending().is_none());
    }

    #[test]
    fn computer_full_turn_returns_control_to_player() {
        let mut engine = started(&[3, 1]);
        engine.roll().unwrap();
        engine.play(pt(8), to(5)).unwrap();
        engine.play(pt(6), to(5)).unwrap();
        run_pending(&mut engine);

        while engine.state().current_player == Some(COMPUTER) {
            assert!(run_pending(&mut engine));
        }

        let state = engine.state();
        assert_eq!(state.current_player, Some(HUMAN));
        assert_eq!(state.pips.black, 167 - 4);
        assert!(engine.pending().is_none());
    }

    #[test]
    fn no_legal_moves_schedules_auto_pass() {
        let mut engine = engine_with(MatchConfig::default(), &[6, 5]);
        let points: Vec<_> = (19..=24)
            .map(|point| (point, Color::Black, 2))
            .chain([(10, Color::White, 14), (2, Color::Black, 3)])
            .collect();
        engine.set_position_for_test(
            board(
                &points,
                SideCounts { white: 1, black: 0 },
                SideCounts::default(),
            ),
            HUMAN,
        );

        engine.roll().unwrap();

        assert!(engine.legal_moves().is_empty());
        assert_eq!(pending_kind(&engine), Some(ContinuationKind::AutoPass));
        assert!(engine.state().log.iter().any(|line| line == "You have no legal moves"));

        engine.confirm_turn().unwrap();
        assert_eq!(engine.state().current_player, Some(COMPUTER));
    }

    #[test]
    fn stale_continuation_is_ignored_after_new_match() {
        let mut engine = started(&[3, 1]);
        engine.roll().unwrap();
        engine.play(pt(8), to(5)).unwrap();
        engine.play(pt(6), to(5)).unwrap();
        let stale = engine.pending().unwrap();

        engine.new_match(MatchConfig::default()).unwrap();

        assert!(!engine.resume(stale));
        assert_eq!(engine.state().phase, "pre-match");
        assert_eq!(*engine.board(), Board::new());
    }

    #[test]
    fn resume_rejects_continuation_that_is_not_pending() {
        let mut engine = started(&[3, 1]);
        engine.roll().unwrap();

        let forged = Continuation {
            epoch: 1,
            seq: 0,
            kind: ContinuationKind::AutoPass,
            delay_ms: 0,
        };

        assert!(!engine.resume(forged));
        assert_eq!(engine.state().current_player, Some(HUMAN));
    }

    #[test]
    fn player_double_taken_by_computer() {
        let mut engine = engine_with(match_to(5), &[3, 1]);
        engine.set_position_for_test(Board::new(), HUMAN);
        engine.cube = Cube::with_state(2, CubeOwner::Center);

        engine.offer_double().unwrap();
        assert!(engine.state().cube.offered);
        assert_eq!(
            engine.pending().map(|c| (c.kind, c.delay_ms)),
            Some((ContinuationKind::DoubleResponse, 1500))
        );

        assert!(run_pending(&mut engine));
        let state = engine.state();

        assert_eq!(state.cube.value, 4);
        assert_eq!(state.cube.owner, CubeOwner::Black);
        assert!(!state.cube.offered);
        assert_eq!(state.current_player, Some(HUMAN));
        assert!(!engine.can_double(HUMAN));
    }

    #[test]
    fn player_double_dropped_when_computer_far_behind() {
        let mut engine = engine_with(match_to(5), &[3, 1]);
        engine.set_position_for_test(
            board(
                &[(1, Color::White, 15), (2, Color::Black, 15)],
                SideCounts::default(),
                SideCounts::default(),
            ),
            HUMAN,
        );

        engine.offer_double().unwrap();
        run_pending(&mut engine);
        let state = engine.state();

        assert_eq!(state.phase, "ended");
        let outcome = state.outcome.unwrap();
        assert_eq!(outcome.kind, WinKind::CubeDropped);
        assert_eq!(outcome.winner, HUMAN);
        assert_eq!(state.score.player_score, 1);
        assert_eq!(pending_kind(&engine), Some(ContinuationKind::NextGame));
    }

    #[test]
    fn computer_doubles_with_race_lead_and_player_takes() {
        let mut engine = engine_with(match_to(5), &[3, 1]);
        engine.set_position_for_test(
            board(
                &[(20, Color::White, 15), (24, Color::Black, 15)],
                SideCounts::default(),
                SideCounts::default(),
            ),
            COMPUTER,
        );

        assert!(run_pending(&mut engine));
        assert!(engine.state().cube.offered);
        assert!(engine.pending().is_none());
        assert_eq!(engine.offer_double(), Err(EngineError::NotYourTurn));

        engine.respond_double(true).unwrap();
        let state = engine.state();

        assert_eq!(state.cube.value, 2);
        assert_eq!(state.cube.owner, CubeOwner::White);
        assert_eq!(
            engine.pending().map(|c| (c.kind, c.delay_ms)),
            Some((ContinuationKind::ComputerRoll, 1500))
        );

        assert!(run_pending(&mut engine));
        assert!(matches!(
            engine.phase(),
            Phase::Playing(Turn {
                player: COMPUTER,
                stage: TurnStage::Moving { .. },
            })
        ));
    }

    #[test]
    fn dropping_computer_double_awards_pre_double_value() {
        let mut engine = engine_with(match_to(5), &[3, 1]);
        engine.set_position_for_test(
            board(
                &[(20, Color::White, 15), (24, Color::Black, 15)],
                SideCounts::default(),
                SideCounts::default(),
            ),
            COMPUTER,
        );
        run_pending(&mut engine);

        engine.respond_double(false).unwrap();

        let outcome = engine.state().outcome.unwrap();
        assert_eq!(outcome.winner, COMPUTER);
        assert_eq!(outcome.points, 1);
        assert_eq!(engine.score().score(COMPUTER), 1);
    }

    #[test]
    fn no_doubling_in_crawford_game_or_single_point_match() {
        let mut single = engine_with(MatchConfig::default(), &[3, 1]);
        single.set_position_for_test(Board::new(), HUMAN);
        assert_eq!(single.offer_double(), Err(EngineError::DoubleNotAllowed));

        let mut engine = engine_with(match_to(5), &[3, 1]);
        engine.score.record(&GameOutcome::cube_dropped(COMPUTER, 4));
        engine.set_position_for_test(Board::new(), HUMAN);

        assert!(engine.score().is_crawford_game());
        assert!(!engine.state().can_double);
        assert_eq!(engine.offer_double(), Err(EngineError::DoubleNotAllowed));
    }

    #[test]
    fn bearing_off_last_checker_scores_gammon_and_schedules_next_game() {
        let mut engine = engine_with(match_to(5), &[2, 1]);
        engine.set_position_for_test(
            board(
                &[(1, Color::White, 1), (12, Color::Black, 15)],
                SideCounts::default(),
                SideCounts { white: 14, black: 0 },
            ),
            HUMAN,
        );
        engine.roll().unwrap();

        // Only one die can be played, so it must be the higher one.
        assert_eq!(
            engine.legal_moves(),
            vec![Move::new(pt(1), Target::Off, 2)]
        );
        engine.play(pt(1), Target::Off).unwrap();
        let state = engine.state();

        let outcome = state.outcome.unwrap();
        assert_eq!(outcome.kind, WinKind::Gammon);
        assert_eq!(outcome.points, 2);
        assert_eq!(state.score.player_score, 2);
        assert_eq!(state.score.match_winner, None);
        assert_eq!(
            engine.pending().map(|c| (c.kind, c.delay_ms)),
            Some((ContinuationKind::NextGame, 2000))
        );

        let epoch = engine.pending().unwrap().epoch;
        assert!(run_pending(&mut engine));
        assert_eq!(engine.state().phase, "opening");
        assert_eq!(engine.pending(), None);
        assert!(engine.epoch > epoch);
    }

    #[test]
    fn winning_the_last_game_ends_the_match() {
        let mut engine = engine_with(MatchConfig::default(), &[2, 1]);
        engine.set_position_for_test(
            board(
                &[(1, Color::White, 1), (12, Color::Black, 10)],
                SideCounts::default(),
                SideCounts { white: 14, black: 5 },
            ),
            HUMAN,
        );
        engine.roll().unwrap();
        engine.play(pt(1), Target::Off).unwrap();

        let state = engine.state();
        assert_eq!(state.score.match_winner, Some(HUMAN));
        assert_eq!(state.outcome.unwrap().kind, WinKind::Single);
        assert!(state.pending.is_none());
        assert_eq!(engine.roll(), Err(EngineError::WrongPhase("ended")));
    }

    #[test]
    fn clock_expiry_forfeits_at_cube_value() {
        let config = MatchConfig {
            use_clock: true,
            ..MatchConfig::default()
        };
        let mut engine = engine_with(config, &[3, 1]);
        engine.start_match().unwrap();
        engine.roll().unwrap();

        for _ in 0..(12 + 120 - 1) {
            assert!(!engine.tick());
        }
        assert!(engine.tick());

        let state = engine.state();
        let outcome = state.outcome.unwrap();
        assert_eq!(outcome.kind, WinKind::Time);
        assert_eq!(outcome.winner, COMPUTER);
        assert_eq!(outcome.points, 1);
        assert_eq!(state.score.match_winner, Some(COMPUTER));
        assert_eq!(state.clock.unwrap().player_seconds, 0);
        assert!(!engine.tick());
    }

    #[test]
    fn clock_pauses_while_double_is_pending() {
        let config = MatchConfig {
            target_score: 5,
            use_clock: true,
            ..MatchConfig::default()
        };
        let mut engine = engine_with(config, &[3, 1]);
        engine.set_position_for_test(Board::new(), HUMAN);
        engine.offer_double().unwrap();
        let before = engine.state().clock;

        for _ in 0..50 {
            assert!(!engine.tick());
        }

        assert_eq!(engine.state().clock, before);
    }

    #[test]
    fn log_keeps_last_five_lines() {
        let mut engine = started(&[3, 1]);
        for _ in 0..10 {
            engine.log("line".to_string());
        }

        assert_eq!(engine.state().log.len(), LOG_LINES);
    }

    fn computer_far_ahead() -> Board {
        board(
            &[(20, Color::White, 15), (24, Color::Black, 15)],
            SideCounts::default(),
            SideCounts::default(),
        )
    }

    fn computer_is_moving(engine: &Engine) -> bool {
        matches!(
            engine.phase(),
            Phase::Playing(Turn {
                player: COMPUTER,
                stage: TurnStage::Moving { .. },
            })
        )
    }

    #[test]
    fn losing_on_time_ends_a_longer_match() {
        let config = MatchConfig {
            target_score: 5,
            use_clock: true,
            seconds_per_point: 1,
            grace_seconds: 0,
            ..MatchConfig::default()
        };
        let mut engine = engine_with(config, &[3, 1]);
        engine.start_match().unwrap();
        engine.roll().unwrap();

        for _ in 0..4 {
            assert!(!engine.tick());
        }
        assert!(engine.tick());

        let state = engine.state();
        assert_eq!(state.outcome.unwrap().kind, WinKind::Time);
        assert_eq!(state.score.computer_score, 1);
        assert_eq!(state.score.match_winner, Some(COMPUTER));
        assert!(state.pending.is_none());
        assert!(!run_pending(&mut engine));
        for _ in 0..10 {
            assert!(!engine.tick());
        }
        assert_eq!(engine.score().score(COMPUTER), 1);
        assert_eq!(engine.roll(), Err(EngineError::WrongPhase("ended")));
    }

    #[test]
    fn computer_does_not_double_in_crawford_game() {
        let mut engine = engine_with(match_to(5), &[3, 1]);
        engine.score.record(&GameOutcome::cube_dropped(HUMAN, 4));
        engine.set_position_for_test(computer_far_ahead(), COMPUTER);
        assert!(engine.score().is_crawford_game());

        assert!(run_pending(&mut engine));

        assert!(computer_is_moving(&engine));
        assert!(!engine.state().cube.offered);
        assert_eq!(engine.cube().value(), 1);
    }

    #[test]
    fn nobody_doubles_when_a_two_cube_decides_the_match() {
        let mut engine = engine_with(match_to(3), &[3, 1]);
        engine.score.record(&GameOutcome::cube_dropped(HUMAN, 1));
        engine.score.record(&GameOutcome::cube_dropped(COMPUTER, 1));
        assert!(!engine.score().is_crawford_game());

        engine.set_position_for_test(computer_far_ahead(), HUMAN);
        assert!(!engine.can_double(HUMAN));
        assert_eq!(engine.offer_double(), Err(EngineError::DoubleNotAllowed));

        engine.set_position_for_test(computer_far_ahead(), COMPUTER);
        assert!(run_pending(&mut engine));

        assert!(computer_is_moving(&engine));
        assert_eq!(engine.cube().value(), 1);
    }

    #[test]
    fn same_kind_continuations_are_told_apart() {
        let mut engine = engine_with(MatchConfig::default(), &[4, 4]);
        engine.set_position_for_test(Board::new(), COMPUTER);
        assert!(run_pending(&mut engine));
        assert!(run_pending(&mut engine));

        let first_step = engine.pending().unwrap();
        assert_eq!(first_step.kind, ContinuationKind::ComputerStep);
        assert!(engine.resume(first_step));
        let second_step = engine.pending().unwrap();
        assert_eq!(second_step.kind, ContinuationKind::ComputerStep);
        assert_ne!(first_step, second_step);

        // A timer fired twice hands back the spent step.
        let board = *engine.board();
        assert!(!engine.resume(first_step));
        assert_eq!(*engine.board(), board);
        assert_eq!(engine.pending(), Some(second_step));
    }
}
