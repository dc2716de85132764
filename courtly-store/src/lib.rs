pub mod app_config;
pub mod database;
pub mod snapshot_repo;
pub mod writer;

pub use app_config::Config;
pub use database::DbClient;
pub use snapshot_repo::PgSnapshotStore;
