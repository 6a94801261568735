//! Cluster membership events.
//!
//! The membership protocol itself lives outside this crate; these events are
//! the shape in which its output is handed to the ring and the locator.

use crate::types::MemberId;

/// A change in the cluster membership view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberEvent {
    /// A member joined and is active.
    MemberJoined { member: MemberId },

    /// A member left the cluster gracefully.
    MemberLeft { member: MemberId },

    /// A member was declared dead by the failure detector.
    MemberDead { member: MemberId },
}

impl MemberEvent {
    /// The member the event is about.
    pub fn member(&self) -> MemberId {
        match self {
            MemberEvent::MemberJoined { member }
            | MemberEvent::MemberLeft { member }
            | MemberEvent::MemberDead { member } => *member,
        }
    }

    /// Whether the member is now part of the cluster.
    pub fn is_join(&self) -> bool {
        matches!(self, MemberEvent::MemberJoined { .. })
    }

    /// Whether the member is no longer part of the cluster.
    pub fn is_leave(&self) -> bool {
        !self.is_join()
    }

    /// Whether the member went away without notice.
    pub fn is_failure(&self) -> bool {
        matches!(self, MemberEvent::MemberDead { .. })
    }
}
