pub mod cli;
pub mod config;
pub mod llm;
pub mod logging;
pub mod tools;
