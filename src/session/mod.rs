//! Session accounting for the signed-in member.

pub mod coordinator;
pub mod daily_login;
pub mod state;
pub mod supervisor;
pub mod tracker;

pub use coordinator::{ActivityCoordinator, ActivityDeps, LifecycleEvent, Visibility};
pub use daily_login::DailyLoginTrigger;
pub use state::SessionState;
pub use supervisor::{spawn_activity_supervisor, REMOTE_DRAIN_GRACE};
pub use tracker::SessionTracker;
