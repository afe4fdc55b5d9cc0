//! Session traversal: cursor, session state and the runner that steps it

pub mod cursor;
pub mod runner;
pub mod session;

pub use cursor::Cursor;
pub use runner::{EventHandler, Runner, RunnerConfig, RunnerEvent, StepOutcome};
pub use session::{Session, SessionControl, SessionSnapshot};
