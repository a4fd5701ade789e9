pub mod cluster;
pub mod core;
pub mod event;
pub mod schema;
pub mod source;

pub use self::cluster::ClusterRecord;
pub use self::core::{Database, DbErrorExt};
pub use self::event::{ClusterableEvent, EventPatch, MergeCandidateRow};
