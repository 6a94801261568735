//! Cluster membership notifications.

mod events;

pub use events::MemberEvent;
