//! Warnings and their per-pass id sequence

use kanvas_core::FieldPath;
use serde::Serialize;
use std::fmt;

/// Warning severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warn,
    Danger,
}

/// Width of one block of ids
const BLOCK: u32 = 1000;

const LEVELS_BY_BLOCK: [Level; 3] = [Level::Danger, Level::Warn, Level::Info];

impl Level {
    /// First id of this level's band
    pub fn band(self) -> u32 {
        match self {
            Level::Danger => 1000,
            Level::Warn => 2000,
            Level::Info => 3000,
        }
    }

    /// Level whose band holds `id`
    ///
    /// Bands repeat every three blocks, so ids past the first thousand of a
    /// level still map back to it: 4000-4999 is danger again, 5000-5999 warn.
    pub fn of_id(id: u32) -> Option<Level> {
        let block = (id / BLOCK).checked_sub(1)?;
        Some(LEVELS_BY_BLOCK[(block % 3) as usize])
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Danger => "danger",
        };
        write!(f, "{}", name)
    }
}

/// One diagnostic, traceable to the node that owns the offending field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Warning {
    /// Stable within one evaluation pass
    pub id: u32,
    pub rule_id: String,
    pub level: Level,
    pub title: String,
    pub message: String,
    /// Owning node first, then the resource node being checked if different
    pub nodes: Vec<String>,
    /// Path relative to `nodes[0]`
    pub field_path: FieldPath,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// Hands out warning ids for one evaluation pass
///
/// Each level counts up from its own band: danger from 1000, warn from 2000,
/// info from 3000. A level that fills its block of a thousand continues in
/// its next block three thousand further on (danger 1999 is followed by
/// 4000), so ids never cross into another level's band however many
/// warnings a pass produces. Create one per pass and drop it afterwards.
#[derive(Debug, Clone, Default)]
pub struct WarningSequence {
    danger: u32,
    warn: u32,
    info: u32,
}

impl WarningSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self, level: Level) -> u32 {
        let counter = match level {
            Level::Danger => &mut self.danger,
            Level::Warn => &mut self.warn,
            Level::Info => &mut self.info,
        };
        let block = *counter / BLOCK;
        let id = level.band() + block * 3 * BLOCK + *counter % BLOCK;
        *counter += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_bands() {
        let mut seq = WarningSequence::new();
        assert_eq!(seq.next(Level::Danger), 1000);
        assert_eq!(seq.next(Level::Warn), 2000);
        assert_eq!(seq.next(Level::Danger), 1001);
        assert_eq!(seq.next(Level::Info), 3000);
        assert_eq!(seq.next(Level::Warn), 2001);
    }

    #[test]
    fn test_sequence_overflow_stays_in_band() {
        let mut seq = WarningSequence::new();
        let mut seen = std::collections::HashSet::new();
        for i in 0..2500 {
            let level = if i % 5 == 0 { Level::Warn } else { Level::Danger };
            let id = seq.next(level);
            assert!(seen.insert(id), "duplicate id {}", id);
            assert_eq!(Level::of_id(id), Some(level), "id {} left its band", id);
        }
        for _ in 0..1200 {
            let id = seq.next(Level::Info);
            assert!(seen.insert(id), "duplicate id {}", id);
            assert_eq!(Level::of_id(id), Some(Level::Info));
        }
    }

    #[test]
    fn test_sequence_block_boundaries() {
        let mut seq = WarningSequence::new();
        let ids: Vec<u32> = (0..1001).map(|_| seq.next(Level::Danger)).collect();
        assert_eq!(ids[999], 1999);
        assert_eq!(ids[1000], 4000);
        assert_eq!(Level::of_id(999), None);
        assert_eq!(Level::of_id(6500), Some(Level::Info));
    }

    #[test]
    fn test_fresh_sequence_restarts() {
        let mut first = WarningSequence::new();
        first.next(Level::Danger);
        let mut second = WarningSequence::new();
        assert_eq!(second.next(Level::Danger), 1000);
    }

    #[test]
    fn test_level_serialization() {
        assert_eq!(serde_json::to_string(&Level::Danger).unwrap(), "\"danger\"");
        assert!(Level::Danger > Level::Warn);
        assert!(Level::Warn > Level::Info);
    }
}
