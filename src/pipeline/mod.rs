pub mod composer;
pub mod config;
pub mod grammar;
pub mod partition;
pub mod pattern;
pub mod persistence;
