//! Application services: publishing, following and reading timelines.

mod deadline;
pub mod error;
pub mod follow;
pub mod publish;
pub mod repos;
pub mod timeline;
