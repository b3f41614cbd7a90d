use serde::Serialize;

use crate::board::{Board, CHECKERS_PER_SIDE};
use crate::config::MatchConfig;
use crate::types::{ClockView, Color};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WinKind {
    Single,
    Gammon,
    Backgammon,
    CubeDropped,
    Time,
}

impl WinKind {
    pub fn multiplier(self) -> u32 {
        match self {
            Self::Gammon => 2,
            Self::Backgammon => 3,
            Self::Single | Self::CubeDropped | Self::Time => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Single => "Single Game",
            Self::Gammon => "Gammon",
            Self::Backgammon => "Backgammon",
            Self::CubeDropped => "Cube Dropped",
            Self::Time => "Loss on Time",
        }
    }
}

/// How a game ended and what it is worth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GameOutcome {
    pub winner: Color,
    pub kind: WinKind,
    pub cube_value: u32,
    pub points: u32,
}

impl GameOutcome {
    fn new(winner: Color, kind: WinKind, cube_value: u32) -> Self {
        Self {
            winner,
            kind,
            cube_value,
            points: cube_value * kind.multiplier(),
        }
    }

    /// Scores a game won by bearing off all fifteen checkers.
    pub fn borne_off(board: &Board, winner: Color, cube_value: u32) -> Self {
        let loser = winner.opponent();
        let kind = if board.borne_off(loser) > 0 {
            WinKind::Single
        } else if board.bar(loser) > 0 || board.has_checker_in_home_of(loser, winner) {
            WinKind::Backgammon
        } else {
            WinKind::Gammon
        };
        debug_assert_eq!(board.borne_off(winner), CHECKERS_PER_SIDE);
        Self::new(winner, kind, cube_value)
    }

    /// The opponent of `winner` refused a double; the pre-double value is paid.
    pub fn cube_dropped(winner: Color, cube_value: u32) -> Self {
        Self::new(winner, WinKind::CubeDropped, cube_value)
    }

    /// The opponent of `winner` ran out of time. No gammon or backgammon.
    pub fn time_forfeit(winner: Color, cube_value: u32) -> Self {
        Self::new(winner, WinKind::Time, cube_value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrawfordStatus {
    Crawford,
    PostCrawford,
}

/// Per-side match clock with a grace countdown at the start of every turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchClock {
    white: u32,
    black: u32,
    grace: u32,
    grace_seconds: u32,
}

impl MatchClock {
    pub fn new(seconds: u32, grace_seconds: u32) -> Self {
        Self {
            white: seconds,
            black: seconds,
            grace: 0,
            grace_seconds,
        }
    }

    pub fn remaining(&self, color: Color) -> u32 {
        match color {
            Color::White => self.white,
            Color::Black => self.black,
        }
    }

    pub fn grace(&self) -> u32 {
        self.grace
    }

    pub fn start_grace(&mut self) {
        self.grace = self.grace_seconds;
    }

    /// One second passes on `active`'s turn. Grace is consumed first.
    /// Returns `true` only on the tick that uses up `active`'s last second.
    pub fn tick(&mut self, active: Color) -> bool {
        if self.grace > 0 {
            self.grace -= 1;
            return false;
        }
        let left = match active {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        };
        if *left == 0 {
            return false;
        }
        *left -= 1;
        *left == 0
    }

    pub fn to_view(&self) -> ClockView {
        ClockView {
            player_seconds: self.white,
            computer_seconds: self.black,
            grace_seconds: self.grace,
        }
    }
}

/// Cross-game match bookkeeping: score, Crawford status, clock.
/// White is the player, black the computer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchState {
    target: u32,
    player_score: u32,
    computer_score: u32,
    crawford_game: bool,
    crawford_used: bool,
    winner: Option<Color>,
    clock: Option<MatchClock>,
}

impl MatchState {
    pub fn new(config: &MatchConfig) -> Self {
        Self {
            target: config.target_score,
            player_score: 0,
            computer_score: 0,
            crawford_game: false,
            crawford_used: false,
            winner: None,
            clock: config
                .use_clock
                .then(|| MatchClock::new(config.clock_seconds(), config.grace_seconds)),
        }
    }

    pub fn target(&self) -> u32 {
        self.target
    }

    pub fn score(&self, color: Color) -> u32 {
        match color {
            Color::White => self.player_score,
            Color::Black => self.computer_score,
        }
    }

    pub fn is_crawford_game(&self) -> bool {
        self.crawford_game
    }

    pub fn winner(&self) -> Option<Color> {
        self.winner
    }

    pub fn clock(&self) -> Option<&MatchClock> {
        self.clock.as_ref()
    }

    pub fn clock_mut(&mut self) -> Option<&mut MatchClock> {
        self.clock.as_mut()
    }

    /// Doubling is pointless when either side would clinch the match at the
    /// doubled value whatever happens.
    pub fn doubling_is_moot(&self, cube_value: u32) -> bool {
        let doubled = cube_value * 2;
        self.player_score + doubled >= self.target && self.computer_score + doubled >= self.target
    }

    /// Adds a finished game to the score and advances Crawford status.
    /// Returns the match winner once the match is decided. Losing on time
    /// loses the match.
    pub fn record(&mut self, outcome: &GameOutcome) -> Option<Color> {
        match outcome.winner {
            Color::White => self.player_score += outcome.points,
            Color::Black => self.computer_score += outcome.points,
        }
        if outcome.kind == WinKind::Time {
            self.winner = Some(outcome.winner);
            return self.winner;
        }

        if self.crawford_game {
            self.crawford_game = false;
        } else if !self.crawford_used && self.target > 1 && self.one_away() {
            self.crawford_game = true;
            self.crawford_used = true;
        }

        if self.player_score >= self.target {
            self.winner = Some(Color::White);
        } else if self.computer_score >= self.target {
            self.winner = Some(Color::Black);
        }
        self.winner
    }

    pub fn crawford_status(&self) -> Option<CrawfordStatus> {
        if self.target == 1 || !self.one_away() {
            return None;
        }
        if self.crawford_game {
            Some(CrawfordStatus::Crawford)
        } else {
            Some(CrawfordStatus::PostCrawford)
        }
    }

    fn one_away(&self) -> bool {
        self.player_score + 1 == self.target || self.computer_score + 1 == self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SideCounts;

    fn config(target: u32) -> MatchConfig {
        MatchConfig {
            target_score: target,
            ..MatchConfig::default()
        }
    }

    fn finished(points: &[(u8, Color, u8)], bar: SideCounts, off: SideCounts) -> Board {
        Board::from_points(points, bar, off).unwrap()
    }

    #[test]
    fn single_game_when_loser_bore_off() {
        let board = finished(
            &[(20, Color::Black, 10)],
            SideCounts::default(),
            SideCounts { white: 15, black: 5 },
        );

        let outcome = GameOutcome::borne_off(&board, Color::White, 2);

        assert_eq!(outcome.kind, WinKind::Single);
        assert_eq!(outcome.points, 2);
    }

    #[test]
    fn gammon_when_loser_bore_off_nothing() {
        let board = finished(
            &[(20, Color::Black, 15)],
            SideCounts::default(),
            SideCounts { white: 15, black: 0 },
        );

        let outcome = GameOutcome::borne_off(&board, Color::White, 1);

        assert_eq!(outcome.kind, WinKind::Gammon);
        assert_eq!(outcome.points, 2);
    }

    #[test]
    fn backgammon_when_loser_stuck_in_winner_home() {
        let board = finished(
            &[(3, Color::Black, 1), (20, Color::Black, 14)],
            SideCounts::default(),
            SideCounts { white: 15, black: 0 },
        );

        let outcome = GameOutcome::borne_off(&board, Color::White, 2);

        assert_eq!(outcome.kind, WinKind::Backgammon);
        assert_eq!(outcome.points, 6);
    }

    #[test]
    fn backgammon_when_loser_on_bar() {
        let board = finished(
            &[(10, Color::White, 14)],
            SideCounts { white: 1, black: 0 },
            SideCounts { white: 0, black: 15 },
        );

        let outcome = GameOutcome::borne_off(&board, Color::Black, 1);

        assert_eq!(outcome.kind, WinKind::Backgammon);
        assert_eq!(outcome.winner, Color::Black);
    }

    #[test]
    fn time_forfeit_never_multiplies() {
        let outcome = GameOutcome::time_forfeit(Color::Black, 4);

        assert_eq!(outcome.points, 4);
        assert_eq!(outcome.kind, WinKind::Time);
    }

    #[test]
    fn crawford_game_follows_first_reach_of_match_point_only() {
        let mut state = MatchState::new(&config(3));

        state.record(&GameOutcome::cube_dropped(Color::White, 2));
        assert!(state.is_crawford_game());
        assert_eq!(state.crawford_status(), Some(CrawfordStatus::Crawford));

        state.record(&GameOutcome::cube_dropped(Color::Black, 1));
        assert!(!state.is_crawford_game());
        assert_eq!(state.crawford_status(), Some(CrawfordStatus::PostCrawford));

        // Player still one away after the post-Crawford game: not re-armed.
        state.record(&GameOutcome::cube_dropped(Color::Black, 1));
        assert!(!state.is_crawford_game());
        assert_eq!(state.winner(), None);
    }

    #[test]
    fn match_decided_when_target_reached() {
        let mut state = MatchState::new(&config(3));

        assert_eq!(state.record(&GameOutcome::cube_dropped(Color::Black, 4)), Some(Color::Black));
        assert_eq!(state.score(Color::Black), 4);
    }

    #[test]
    fn doubling_moot_only_when_both_sides_clinch() {
        let mut state = MatchState::new(&config(3));
        assert!(!state.doubling_is_moot(1));

        state.record(&GameOutcome::cube_dropped(Color::White, 1));
        state.record(&GameOutcome::cube_dropped(Color::Black, 1));
        // 1-1 to 3: a 2-cube wins the match for either side.
        assert!(state.doubling_is_moot(1));
    }

    #[test]
    fn clock_spends_grace_before_time() {
        let mut clock = MatchClock::new(3, 2);
        clock.start_grace();

        assert!(!clock.tick(Color::White));
        assert!(!clock.tick(Color::White));
        assert_eq!(clock.remaining(Color::White), 3);
        assert!(!clock.tick(Color::White));
        assert!(!clock.tick(Color::White));
        assert!(clock.tick(Color::White));
        assert_eq!(clock.remaining(Color::Black), 3);
    }

    #[test]
    fn flagged_clock_does_not_fire_again() {
        let mut clock = MatchClock::new(1, 0);

        assert!(clock.tick(Color::White));
        assert!(!clock.tick(Color::White));
        assert_eq!(clock.remaining(Color::White), 0);
    }

    #[test]
    fn losing_on_time_loses_the_match() {
        let mut state = MatchState::new(&config(5));

        let winner = state.record(&GameOutcome::time_forfeit(Color::Black, 1));

        assert_eq!(winner, Some(Color::Black));
        assert_eq!(state.score(Color::Black), 1);
        assert!(!state.is_crawford_game());
    }
}
