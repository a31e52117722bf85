//! Commission scenario search: which client mixes across the TPV tiers reach a
//! monthly commission goal, ranked by total volume or by client count.

pub mod cli;
pub mod commission;
pub mod config;
pub mod optimizer;
pub mod parallel;
pub mod report;
pub mod server;
