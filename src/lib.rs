#![forbid(unsafe_code)]

pub mod anthropic;
pub mod cli;
pub mod commands;
pub mod config;
pub mod content;
pub mod error;
pub mod export;
pub mod gateway;
pub mod logging;
pub mod openai;
pub mod outline;
pub mod parse;
pub mod project;
pub mod prompts;
pub mod repl;
pub mod stats;
pub mod wizard;
