mod level;

pub use level::{level_for_xp, xp_for_level, LevelProgress, XP_PER_LEVEL_UNIT};
