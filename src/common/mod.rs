pub mod config;
pub mod errors;
pub mod format;
pub mod fsops;
pub mod instance;
pub mod logging;
pub mod safety;
