use serde::Serialize;

/// `level = floor(sqrt(xp / XP_PER_LEVEL_UNIT)) + 1`
pub const XP_PER_LEVEL_UNIT: u64 = 100;

/// Level for a member's accumulated XP. Always derived, never stored.
pub fn level_for_xp(total_xp: u64) -> u32 {
    let units = total_xp / XP_PER_LEVEL_UNIT;
    // Integer square root; f64 alone misrounds near perfect squares.
    let mut root = (units as f64).sqrt() as u64;
    while root * root > units {
        root -= 1;
    }
    while (root + 1) * (root + 1) <= units {
        root += 1;
    }
    (root + 1) as u32
}

/// XP at which `level` is reached. Level 1 starts at zero.
pub fn xp_for_level(level: u32) -> u64 {
    let steps = u64::from(level.saturating_sub(1));
    steps.saturating_mul(steps).saturating_mul(XP_PER_LEVEL_UNIT)
}

/// Where a member sits between their current and next level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelProgress {
    pub level: u32,
    pub xp_into_level: u64,
    pub xp_for_next_level: u64,
}

impl LevelProgress {
    pub fn from_xp(total_xp: u64) -> Self {
        let level = level_for_xp(total_xp);
        let floor = xp_for_level(level);
        let ceiling = xp_for_level(level.saturating_add(1));
        Self {
            level,
            xp_into_level: total_xp - floor,
            xp_for_next_level: ceiling - floor,
        }
    }

    /// Progress towards the next level in `0.0..1.0`.
    pub fn fraction(&self) -> f64 {
        if self.xp_for_next_level == 0 {
            return 0.0;
        }
        self.xp_into_level as f64 / self.xp_for_next_level as f64
    }
}
