//! CLI module graph.

pub mod command;
pub mod dispatch;
pub mod exit;
pub mod output;
pub mod report;
pub mod run;
pub mod status;
