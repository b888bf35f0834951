pub mod checkpoint_store;
pub mod config;
mod json_file;
pub mod schedule_store;
pub mod state_dir;

pub use checkpoint_store::FileCheckpointStore;
pub use config::StoreConfig;
pub use schedule_store::FileScheduleStore;
pub use state_dir::StateDir;
