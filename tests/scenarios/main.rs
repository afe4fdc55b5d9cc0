//! Scenario-based tests for graphk

mod helpers;

mod branching;
mod concurrent_sessions;
mod inspection;
mod pause_resume;
mod success_chain;
