use color_eyre::{eyre::bail, Result};
use serde::Serialize;

/// Default progression: levels 1..=9, each threshold doubling from 10.
pub const DEFAULT_THRESHOLDS: [i64; 9] = [0, 10, 20, 40, 80, 160, 320, 640, 1280];

/// Cumulative XP thresholds; index `i` holds the XP needed for level `i + 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelTable {
    thresholds: Vec<i64>,
}

impl Default for LevelTable {
    fn default() -> Self {
        Self {
            thresholds: DEFAULT_THRESHOLDS.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelProgress {
    pub level: i64,
    pub xp_to_next_level: i64,
    pub progress_percent: i64,
}

impl LevelTable {
    /// Build a table from configuration. The first threshold must be 0 and
    /// the rest strictly increasing.
    pub fn new(thresholds: Vec<i64>) -> Result<Self> {
        if thresholds.is_empty() {
            bail!("level table needs at least one threshold");
        }
        if thresholds[0] != 0 {
            bail!("first level threshold must be 0, got {}", thresholds[0]);
        }
        if let Some(pair) = thresholds.windows(2).find(|w| w[1] <= w[0]) {
            bail!(
                "level thresholds must be strictly increasing ({} followed by {})",
                pair[0],
                pair[1]
            );
        }
        Ok(Self { thresholds })
    }

    pub fn max_level(&self) -> i64 {
        self.thresholds.len() as i64
    }

    pub fn thresholds(&self) -> &[i64] {
        &self.thresholds
    }

    /// Highest level whose threshold is reached. Negative XP is level 1.
    pub fn level(&self, xp: i64) -> i64 {
        self.thresholds.iter().filter(|&&t| xp >= t).count().max(1) as i64
    }

    /// XP required to reach `level`, clamping out-of-range levels.
    pub fn xp_for_level(&self, level: i64) -> i64 {
        let idx = level.clamp(1, self.max_level()) - 1;
        self.thresholds[idx as usize]
    }

    /// XP still missing for the next level; 0 once the last level is reached.
    pub fn xp_to_next_level(&self, xp: i64) -> i64 {
        let level = self.level(xp);
        if level >= self.max_level() {
            return 0;
        }
        self.xp_for_level(level + 1) - xp.max(0)
    }

    /// Progress inside the current level, 0 at the floor and 100 at the
    /// ceiling. Saturates at 100 on the last level.
    pub fn progress_percent(&self, xp: i64) -> i64 {
        let level = self.level(xp);
        if level >= self.max_level() {
            return 100;
        }
        let floor = self.xp_for_level(level);
        let ceiling = self.xp_for_level(level + 1);
        ((xp.max(0) - floor) * 100 / (ceiling - floor)).clamp(0, 100)
    }

    pub fn progress(&self, xp: i64) -> LevelProgress {
        LevelProgress {
            level: self.level(xp),
            xp_to_next_level: self.xp_to_next_level(xp),
            progress_percent: self.progress_percent(xp),
        }
    }
}
