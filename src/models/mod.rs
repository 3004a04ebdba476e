pub mod message;
pub mod presence;
pub mod session;
pub mod user;

pub use message::{Author, ChatMessage};
pub use presence::PresenceAnnouncement;
pub use session::FlushOutcome;
pub use user::{AuthUser, UserId};
