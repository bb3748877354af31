pub mod cancel;
pub mod config;
pub mod engine;
pub mod error;
pub mod notify;
pub mod session;
pub mod shutdown;
pub mod workflow;
pub mod workspace;

#[cfg(test)]
pub(crate) mod testing;
