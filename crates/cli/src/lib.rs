#![forbid(unsafe_code)]

pub mod cli;
pub mod commands;
pub mod signals;
