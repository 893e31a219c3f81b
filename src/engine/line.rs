use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use super::error::EngineError;

/// Side of a prop line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Over,
    Under,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Over => "over",
            Direction::Under => "under",
        }
    }

    /// Canonical token for any accepted spelling. Idempotent.
    pub fn normalize(raw: &str) -> Result<&'static str, EngineError> {
        raw.parse::<Direction>().map(|d| d.as_str())
    }
}

impl FromStr for Direction {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "over" | "o" | "more" | "higher" | ">" => Ok(Direction::Over),
            "under" | "u" | "less" | "fewer" | "lower" | "<" => Ok(Direction::Under),
            _ => Err(EngineError::InvalidDirection(s.trim().to_string())),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a value equal to the line is scored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// over: value > line, under: value < line; a push is a miss
    Strict,
    /// over: value >= line, under: value <= line; a push is a hit
    #[cfg(test)]
    Inclusive,
}

/// Operator every line-based insight uses.
pub const HIT_COMPARISON: Comparison = Comparison::Strict;

/// A numeric threshold plus the side being evaluated
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LineQuery {
    pub line: f64,
    pub direction: Direction,
}

impl LineQuery {
    pub fn new(line: f64, direction: Direction) -> Result<Self, EngineError> {
        if !line.is_finite() {
            return Err(EngineError::InvalidLine(line.to_string()));
        }
        Ok(LineQuery { line, direction })
    }

    pub fn hits(&self, value: f64, comparison: Comparison) -> bool {
        match (self.direction, comparison) {
            (Direction::Over, Comparison::Strict) => value > self.line,
            #[cfg(test)]
            (Direction::Over, Comparison::Inclusive) => value >= self.line,
            (Direction::Under, Comparison::Strict) => value < self.line,
            #[cfg(test)]
            (Direction::Under, Comparison::Inclusive) => value <= self.line,
        }
    }

    /// Signed distance of a value beyond the line in the bet's favour.
    pub fn margin(&self, value: f64) -> f64 {
        match self.direction {
            Direction::Over => value - self.line,
            Direction::Under => self.line - value,
        }
    }
}

/// Parse a line from request text ("24.5", " 7 ").
pub fn parse_line(raw: &str) -> Result<f64, EngineError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| EngineError::InvalidLine(raw.trim().to_string()))
}
