pub mod manager;

pub use manager::WorkspaceManager;
