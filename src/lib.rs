//! GeekFlash Library
//!
//! Console front end for the flash orchestrator: argument parsing and the
//! NDJSON event runner.

pub mod cli;
pub mod headless;

pub use headless::runner::Console;
pub use headless::HeadlessEvent;
