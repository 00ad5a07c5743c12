//! Drives the tip jar program through a scripted walkthrough.
//!
//! The driver talks to the ledger only through [ExecutionEnvironment]; the
//! bundled [LocalEnvironment] runs the program's state transitions in
//! process, so a walkthrough needs no cluster. The comment log is read the
//! way a cluster client reads it, by decoding the jar account
//! ([fetch_comments]).

pub mod config;
pub mod environment;
pub mod error;
pub mod simulation;

pub use config::{Scenario, TipScript};
pub use environment::{fetch_comments, ExecutionEnvironment, LocalEnvironment};
pub use error::{EnvError, SimError};
pub use simulation::{format_sol, stage, Orchestrator, ScriptedTip, Stage};
