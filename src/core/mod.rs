pub mod correlation;
pub mod fanout;
pub mod poll;
pub mod port_reclaim;

pub use crate::domain::model::PollStatus;
pub use crate::domain::ports::{ArtifactStore, CommandRunner, StatusSource};
pub use crate::utils::error::Result;
