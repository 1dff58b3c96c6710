//! `SeaORM` Entity prelude

pub use super::sync_logs::Entity as SyncLogs;
pub use super::syncs::Entity as Syncs;
pub use super::users::Entity as Users;
