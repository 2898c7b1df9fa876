//! sitecrew: a simulated web studio.
//!
//! A small team of model-backed agents (developer, client, designer, QA,
//! manager, ...) talks in rounds and builds a website as it goes:
//! - `directive` pulls file, command and image instructions out of replies
//! - `executor` applies them to the project `store`
//! - `context` and `scheduler` decide who speaks in each round
//! - `studio` drives rounds and multi-round workflows

pub mod agent;
pub mod command;
pub mod config;
pub mod context;
pub mod directive;
pub mod error;
pub mod executor;
pub mod image_gen;
pub mod journal;
pub mod llm;
pub mod output;
pub mod roster;
pub mod scheduler;
pub mod store;
pub mod studio;
