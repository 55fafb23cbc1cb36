//! Paperpilot library
//!
//! Configuration, the OpenAI computer-use oracle, research task goals and the
//! CLI wiring around the action loop.

pub mod cli;
pub mod config;
pub mod llm;
pub mod tasks;

pub use config::{AppConfig, Credentials};
pub use llm::OpenAiComputerUseOracle;
pub use tasks::{JournalGuidelines, ResearchTask, TaskError, TaskRunner};
