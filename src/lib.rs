pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod feedback;
pub mod job;
pub mod pipeline;
pub mod poller;
pub mod report;
pub mod resolver;
pub mod schedule;
pub mod session;
pub mod submit;
pub mod transport;
pub mod util;
