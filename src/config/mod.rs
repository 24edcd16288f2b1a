pub mod app_config;
pub mod cli;
pub mod model;
pub mod probe_config;
