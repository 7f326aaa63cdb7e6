pub mod backend;
pub mod orchestrator;
pub mod presenter;
pub mod progress;
pub mod render;
