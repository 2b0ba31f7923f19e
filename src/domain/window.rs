//! Fetch window: how far back a history request reaches.
//!
//! Accepted forms are a positive count followed by a unit: `d` (days),
//! `wk` (weeks), `mo` (months, 30 days), `y` (years, 365 days).

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WindowUnit {
    Days,
    Weeks,
    Months,
    Years,
}

impl WindowUnit {
    fn days(self) -> u32 {
        match self {
            WindowUnit::Days => 1,
            WindowUnit::Weeks => 7,
            WindowUnit::Months => 30,
            WindowUnit::Years => 365,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            WindowUnit::Days => "d",
            WindowUnit::Weeks => "wk",
            WindowUnit::Months => "mo",
            WindowUnit::Years => "y",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FetchWindow {
    count: u32,
    unit: WindowUnit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid fetch window '{input}': expected e.g. 2y, 6mo, 52wk, 90d")]
pub struct WindowParseError {
    pub input: String,
}

impl FetchWindow {
    pub fn new(count: u32, unit: WindowUnit) -> Option<Self> {
        (count > 0).then_some(FetchWindow { count, unit })
    }

    pub fn years(count: u32) -> Option<Self> {
        Self::new(count, WindowUnit::Years)
    }

    /// Calendar days covered by the window.
    pub fn days(&self) -> i64 {
        i64::from(self.count) * i64::from(self.unit.days())
    }
}

impl Default for FetchWindow {
    fn default() -> Self {
        FetchWindow {
            count: 2,
            unit: WindowUnit::Years,
        }
    }
}

impl FromStr for FetchWindow {
    type Err = WindowParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || WindowParseError {
            input: s.to_string(),
        };
        let trimmed = s.trim().to_ascii_lowercase();
        let split = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(err)?;
        let (digits, suffix) = trimmed.split_at(split);
        let count: u32 = digits.parse().map_err(|_| err())?;
        let unit = match suffix {
            "d" => WindowUnit::Days,
            "wk" => WindowUnit::Weeks,
            "mo" => WindowUnit::Months,
            "y" => WindowUnit::Years,
            _ => return Err(err()),
        };
        FetchWindow::new(count, unit).ok_or_else(err)
    }
}

impl fmt::Display for FetchWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.count, self.unit.suffix())
    }
}
