use std::collections::VecDeque;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

/// The two dice of one roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Roll {
    pub values: [u8; 2],
}

impl Roll {
    pub fn new(first: u8, second: u8) -> Self {
        Self {
            values: [first, second],
        }
    }

    pub fn is_double(&self) -> bool {
        self.values[0] == self.values[1]
    }

    /// Dice values playable this turn; a double is played four times.
    pub fn moves(&self) -> Vec<u8> {
        if self.is_double() {
            vec![self.values[0]; 4]
        } else {
            self.values.to_vec()
        }
    }
}

const MAX_REROLLS: usize = 64;

/// Source of die values in 1..=6.
pub trait DiceRoller: Send {
    fn roll_die(&mut self) -> u8;

    fn roll(&mut self) -> Roll {
        let first = self.roll_die();
        let second = self.roll_die();
        Roll::new(first, second)
    }

    /// Rolls until the two dice differ (opening roll, opening drill).
    ///
    /// A roller that keeps producing doubles, such as a script of doubles,
    /// gets its second die moved up by one pip after `MAX_REROLLS` tries.
    fn roll_distinct(&mut self) -> Roll {
        let mut roll = self.roll();
        for _ in 0..MAX_REROLLS {
            if !roll.is_double() {
                return roll;
            }
            roll = self.roll();
        }
        if roll.is_double() {
            let [first, _] = roll.values;
            roll = Roll::new(first, first % 6 + 1);
        }
        roll
    }
}

/// Pseudorandom dice seeded by the host; no OS entropy is needed, so the same
/// roller works in the browser.
pub struct SeededDice {
    rng: ChaCha8Rng,
}

impl SeededDice {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl DiceRoller for SeededDice {
    fn roll_die(&mut self) -> u8 {
        self.rng.gen_range(1..=6)
    }
}

/// Replays a fixed list of die values, cycling when exhausted. An empty
/// script rolls 1s.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDice {
    values: VecDeque<u8>,
}

impl ScriptedDice {
    pub fn new(values: impl IntoIterator<Item = u8>) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }
}

impl DiceRoller for ScriptedDice {
    fn roll_die(&mut self) -> u8 {
        match self.values.pop_front() {
            Some(value) => {
                self.values.push_back(value);
                value
            }
            None => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_expands_to_four_moves() {
        assert_eq!(Roll::new(4, 4).moves(), vec![4, 4, 4, 4]);
        assert_eq!(Roll::new(6, 2).moves(), vec![6, 2]);
    }

    #[test]
    fn seeded_dice_stay_in_range_and_repeat_per_seed() {
        let mut a = SeededDice::new(7);
        let mut b = SeededDice::new(7);

        for _ in 0..200 {
            let value = a.roll_die();
            assert!((1..=6).contains(&value));
            assert_eq!(value, b.roll_die());
        }
    }

    #[test]
    fn roll_distinct_skips_doubles() {
        let mut dice = ScriptedDice::new([3, 3, 5, 5, 2, 6]);

        assert_eq!(dice.roll_distinct(), Roll::new(2, 6));
    }

    #[test]
    fn roll_distinct_gives_up_on_endless_doubles() {
        assert_eq!(ScriptedDice::default().roll_distinct(), Roll::new(1, 2));
        assert_eq!(ScriptedDice::new([6, 6]).roll_distinct(), Roll::new(6, 1));
    }
}
