pub mod config;
pub mod counter;
pub mod diagnostics;
pub mod driver;
pub mod error;
pub mod logging;
pub mod pose;
pub mod protocol;
pub mod relay;
pub mod trigger;
