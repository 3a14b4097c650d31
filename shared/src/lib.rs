pub mod config;
pub mod disk;
pub mod dynamo;
pub mod proxy;
pub mod s3;
pub mod state;
pub mod types;

pub use state::AppState;
