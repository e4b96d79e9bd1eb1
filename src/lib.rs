pub mod app;
pub mod browse;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod form;
pub mod gateway;
pub mod listing;
pub mod logging;
pub mod model;
pub mod output;
pub mod overlay;

#[cfg(test)]
mod tests;
