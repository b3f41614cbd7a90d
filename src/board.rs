use std::collections::BTreeMap;
use std::fmt;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::error::EngineError;
use crate::types::{Color, PointView, PositionView, SideCounts};

pub const NUM_POINTS: u8 = 24;
pub const CHECKERS_PER_SIDE: u8 = 15;
const SLOTS: usize = NUM_POINTS as usize + 1;
const BAR_PIPS: u16 = 25;
const STARTING_WHITE: [(u8, u8); 4] = [(24, 2), (13, 5), (8, 3), (6, 5)];
const STARTING_BLACK: [(u8, u8); 4] = [(1, 2), (12, 5), (17, 3), (19, 5)];

/// Where a moving checker comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Bar,
    Point(u8),
}

/// Where a moving checker lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Point(u8),
    Off,
}

/// A single-die checker move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move {
    pub from: Source,
    pub to: Target,
    pub die: u8,
}

impl Move {
    pub fn new(from: Source, to: Target, die: u8) -> Self {
        Self { from, to, die }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bar => f.write_str("bar"),
            Self::Point(point) => write!(f, "{point}"),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Point(point) => write!(f, "{point}"),
            Self::Off => f.write_str("off"),
        }
    }
}

/// Standard notation, e.g. `13/8`, `bar/22`, `3/off`.
impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.from, self.to)
    }
}

impl Serialize for Source {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Bar => serializer.serialize_str("bar"),
            Self::Point(point) => serializer.serialize_u8(*point),
        }
    }
}

impl Serialize for Target {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Point(point) => serializer.serialize_u8(*point),
            Self::Off => serializer.serialize_str("off"),
        }
    }
}

impl Serialize for Move {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Move", 3)?;
        state.serialize_field("from", &self.from)?;
        state.serialize_field("to", &self.to)?;
        state.serialize_field("dice_used", &[self.die])?;
        state.end()
    }
}

/// Backgammon position: per-color checker counts on points 1..=24 plus the
/// bar and borne-off counters. Index 0 of each point array is unused.
///
/// The type is `Copy`, so a move is applied to a snapshot and committed only
/// when it succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Board {
    white: [u8; SLOTS],
    black: [u8; SLOTS],
    bar: SideCounts,
    off: SideCounts,
}

impl Board {
    /// Creates the standard starting position.
    pub fn new() -> Self {
        let mut board = Self::empty();
        for (point, count) in STARTING_WHITE {
            board.white[point as usize] = count;
        }
        for (point, count) in STARTING_BLACK {
            board.black[point as usize] = count;
        }
        board
    }

    /// A board with no checkers anywhere.
    pub fn empty() -> Self {
        Self {
            white: [0; SLOTS],
            black: [0; SLOTS],
            bar: SideCounts::default(),
            off: SideCounts::default(),
        }
    }

    /// Builds a board from `(point, color, count)` entries.
    /// Rejects out-of-range points, mixed colors on a point, and more than
    /// fifteen checkers of one color.
    pub fn from_points(
        points: &[(u8, Color, u8)],
        bar: SideCounts,
        off: SideCounts,
    ) -> Result<Self, EngineError> {
        let mut board = Self::empty();
        board.bar = bar;
        board.off = off;

        for &(point, color, count) in points {
            if !(1..=NUM_POINTS).contains(&point) {
                return Err(EngineError::InvalidPosition(format!(
                    "point {point} is off the board"
                )));
            }
            if board.count(color.opponent(), point) > 0 {
                return Err(EngineError::InvalidPosition(format!(
                    "point {point} holds both colors"
                )));
            }
            board.side_mut(color)[point as usize] += count;
        }

        for color in [Color::White, Color::Black] {
            if board.total(color) > CHECKERS_PER_SIDE {
                return Err(EngineError::InvalidPosition(format!(
                    "{color} has more than {CHECKERS_PER_SIDE} checkers"
                )));
            }
        }

        Ok(board)
    }

    /// Number of `color` checkers on `point` (0 for out-of-range points).
    pub fn count(&self, color: Color, point: u8) -> u8 {
        if !(1..=NUM_POINTS).contains(&point) {
            return 0;
        }
        self.side(color)[point as usize]
    }

    /// Color and count of the checkers on `point`, if any.
    pub fn occupant(&self, point: u8) -> Option<(Color, u8)> {
        [Color::White, Color::Black]
            .into_iter()
            .map(|color| (color, self.count(color, point)))
            .find(|&(_, count)| count > 0)
    }

    pub fn bar(&self, color: Color) -> u8 {
        self.bar.get(color)
    }

    pub fn borne_off(&self, color: Color) -> u8 {
        self.off.get(color)
    }

    pub fn bar_counts(&self) -> SideCounts {
        self.bar
    }

    pub fn off_counts(&self) -> SideCounts {
        self.off
    }

    pub fn on_board(&self, color: Color) -> u8 {
        self.side(color).iter().sum()
    }

    /// On-point + bar + borne-off checkers of `color`.
    pub fn total(&self, color: Color) -> u8 {
        self.on_board(color) + self.bar(color) + self.borne_off(color)
    }

    /// `true` when `color` accounts for exactly fifteen checkers.
    pub fn is_conserved(&self, color: Color) -> bool {
        self.total(color) == CHECKERS_PER_SIDE
    }

    /// `true` when a checker of `color` may land on `point`: empty, own, or a
    /// single opposing blot.
    pub fn is_open_for(&self, color: Color, point: u8) -> bool {
        self.count(color.opponent(), point) <= 1
    }

    /// Every one of the fifteen checkers is in the home board or borne off.
    pub fn all_home(&self, color: Color) -> bool {
        let home = color.home_range();
        let outside = (1..=NUM_POINTS)
            .filter(|point| !home.contains(point))
            .any(|point| self.count(color, point) > 0);
        if outside || self.bar(color) > 0 {
            return false;
        }
        let in_home: u8 = home.map(|point| self.count(color, point)).sum();
        in_home + self.borne_off(color) == CHECKERS_PER_SIDE
    }

    /// Point of the checker of `color` furthest from bearing off.
    pub fn furthest_back(&self, color: Color) -> Option<u8> {
        let occupied = |point: &u8| self.count(color, *point) > 0;
        match color {
            Color::White => (1..=NUM_POINTS).rev().find(occupied),
            Color::Black => (1..=NUM_POINTS).find(occupied),
        }
    }

    /// `true` when `color` has any checker inside `owner`'s home board.
    pub fn has_checker_in_home_of(&self, color: Color, owner: Color) -> bool {
        owner
            .home_range()
            .any(|point| self.count(color, point) > 0)
    }

    /// Race distance for `color`: point distance per checker plus 25 per
    /// checker on the bar. Borne-off checkers count zero.
    pub fn pip_count(&self, color: Color) -> u16 {
        let on_points: u16 = (1..=NUM_POINTS)
            .map(|point| self.count(color, point) as u16 * color.distance(point) as u16)
            .sum();
        on_points + self.bar(color) as u16 * BAR_PIPS
    }

    /// Applies a move for `color`, hitting a lone opposing checker if one sits
    /// on the destination. Returns whether a hit happened.
    ///
    /// Only structural conditions are checked here (a checker to move, an open
    /// destination); full legality belongs to the move generator. On error
    /// the board is unchanged.
    pub fn apply(&mut self, color: Color, mv: Move) -> Result<bool, EngineError> {
        let mut next = *self;
        let opponent = color.opponent();

        match mv.from {
            Source::Bar => {
                let bar = next.bar.get_mut(color);
                if *bar == 0 {
                    return Err(EngineError::IllegalMove(mv));
                }
                *bar -= 1;
            }
            Source::Point(point) => {
                if next.count(color, point) == 0 {
                    return Err(EngineError::IllegalMove(mv));
                }
                next.side_mut(color)[point as usize] -= 1;
            }
        }

        let mut hit = false;
        match mv.to {
            Target::Off => *next.off.get_mut(color) += 1,
            Target::Point(point) => {
                if !(1..=NUM_POINTS).contains(&point) || !next.is_open_for(color, point) {
                    return Err(EngineError::IllegalMove(mv));
                }
                if next.count(opponent, point) == 1 {
                    next.side_mut(opponent)[point as usize] = 0;
                    *next.bar.get_mut(opponent) += 1;
                    hit = true;
                }
                next.side_mut(color)[point as usize] += 1;
            }
        }

        *self = next;
        Ok(hit)
    }

    /// Copy-on-write variant of [`Board::apply`].
    pub fn with_move(&self, color: Color, mv: Move) -> Result<Self, EngineError> {
        let mut next = *self;
        next.apply(color, mv)?;
        Ok(next)
    }

    /// Converts to the point-map form used by the presentation layer.
    pub fn to_view(&self) -> PositionView {
        let points: BTreeMap<u8, PointView> = (1..=NUM_POINTS)
            .filter_map(|point| {
                self.occupant(point)
                    .map(|(color, count)| (point, PointView { color, count }))
            })
            .collect();
        PositionView {
            points,
            bar: self.bar,
            born_off: self.off,
        }
    }

    fn side(&self, color: Color) -> &[u8; SLOTS] {
        match color {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }

    fn side_mut(&mut self, color: Color) -> &mut [u8; SLOTS] {
        match color {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        }
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}
