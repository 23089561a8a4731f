//! Colors and the mana pool used to pay attack costs

use serde::{Deserialize, Serialize};
use std::fmt;

/// The five colors of MTG (colorless is the absence of a color)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Color {
    White,
    Blue,
    Black,
    Red,
    Green,
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::White => write!(f, "W"),
            Color::Blue => write!(f, "U"),
            Color::Black => write!(f, "B"),
            Color::Red => write!(f, "R"),
            Color::Green => write!(f, "G"),
        }
    }
}

/// Mana available to a player
///
/// Attack taxes are generic costs, so payment only needs totals; colored mana
/// is spent in WUBRG order, colorless last.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManaPool {
    #[serde(default)]
    pub white: u8,
    #[serde(default)]
    pub blue: u8,
    #[serde(default)]
    pub black: u8,
    #[serde(default)]
    pub red: u8,
    #[serde(default)]
    pub green: u8,
    #[serde(default)]
    pub colorless: u8,
}

impl ManaPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pool holding only colorless mana (handy for tests and scenarios)
    pub fn colorless(amount: u8) -> Self {
        ManaPool {
            colorless: amount,
            ..Self::default()
        }
    }

    pub fn add_color(&mut self, color: Color) {
        match color {
            Color::White => self.white += 1,
            Color::Blue => self.blue += 1,
            Color::Black => self.black += 1,
            Color::Red => self.red += 1,
            Color::Green => self.green += 1,
        }
    }

    pub fn total(&self) -> u32 {
        [
            self.white,
            self.blue,
            self.black,
            self.red,
            self.green,
            self.colorless,
        ]
        .iter()
        .map(|&n| n as u32)
        .sum()
    }

    pub fn can_pay_generic(&self, amount: u32) -> bool {
        self.total() >= amount
    }

    /// Pay a generic cost from this pool
    ///
    /// Either the whole amount is paid or the pool is left untouched.
    pub fn pay_generic(&mut self, amount: u32) -> bool {
        if !self.can_pay_generic(amount) {
            return false;
        }

        let mut remaining = amount;
        for slot in [
            &mut self.white,
            &mut self.blue,
            &mut self.black,
            &mut self.red,
            &mut self.green,
            &mut self.colorless,
        ] {
            let take = remaining.min(*slot as u32);
            *slot -= take as u8;
            remaining -= take;
            if remaining == 0 {
                break;
            }
        }
        true
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
