pub mod clock;
pub mod sessions;
pub mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use sessions::{InMemorySessionStore, SessionStore};
pub use sweeper::SessionSweeper;
