pub mod app;
pub mod cli;
pub mod config;
pub mod errors;
pub mod extract;
pub mod lesson;
pub mod log;
pub mod pipeline;
pub mod progress;
pub mod prompt;
pub mod provider;
pub mod retry;
pub mod safety;
pub mod slug;
pub mod store;
pub mod ux;
pub mod video;
pub mod wire;

#[cfg(test)]
mod testing;
