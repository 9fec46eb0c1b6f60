pub mod initdb;
pub mod migrate_and_serve;
pub mod run_job;
pub mod serve;

pub use initdb::init_database;
pub use migrate_and_serve::migrate_and_serve;
pub use run_job::run_job;
pub use serve::serve;
