//! LRT-facing runtime: messages, the inter-LRT communicator, the per-LRT
//! execution loop, and job-message construction.

pub mod communicator;
pub mod launcher;
pub mod message;
pub mod runner;

pub use communicator::Communicator;
pub use launcher::build_job_message;
pub use message::{JobConstraint, JobMessage, Notification, ParameterMessage, TraceMessage};
pub use runner::{Kernel, RtRunner};
