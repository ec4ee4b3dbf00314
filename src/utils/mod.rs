pub mod config;
pub mod fs;
pub mod input;
pub mod logging;
