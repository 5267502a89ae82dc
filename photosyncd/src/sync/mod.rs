pub mod action;
pub mod diff;
pub mod engine;
pub mod progress;
pub mod snapshot;
pub mod store;
