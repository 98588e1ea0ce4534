//! Per-connection session record.
//!
//! Every accepted connection gets one [`Session`]. It owns the
//! connection's outbound handle and remembers the single role the peer
//! declared, so the disconnect path knows which registry slot to clear.

use core::fmt;

use crate::connection::PeerConnection;
use crate::error::SessionError;

/// The role a connection has taken.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Role {
    /// No role-declaring message has arrived yet. The connection is inert.
    #[default]
    Unassigned,
    /// A controller registered under this device id.
    Device(String),
    /// A dashboard observer.
    Dashboard,
    /// A shared effects screen.
    Screen,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unassigned => f.write_str("unassigned"),
            Self::Device(id) => write!(f, "device {id}"),
            Self::Dashboard => f.write_str("dashboard"),
            Self::Screen => f.write_str("screen"),
        }
    }
}

/// State tracked for one connection over its lifetime.
#[derive(Debug)]
pub struct Session {
    connection: PeerConnection,
    role: Role,
}

impl Session {
    /// Start an unassigned session for `connection`.
    pub const fn new(connection: PeerConnection) -> Self {
        Self {
            connection,
            role: Role::Unassigned,
        }
    }

    /// The connection's outbound handle.
    pub const fn connection(&self) -> &PeerConnection {
        &self.connection
    }

    /// The role taken so far.
    pub const fn role(&self) -> &Role {
        &self.role
    }

    /// Take `role`. Succeeds if the session is unassigned or already holds
    /// exactly this role; any other transition is a conflict.
    pub fn assign(&mut self, role: Role) -> Result<(), SessionError> {
        if self.role == Role::Unassigned {
            self.role = role;
            return Ok(());
        }
        if self.role == role {
            return Ok(());
        }
        Err(SessionError::RoleConflict {
            current: self.role.clone(),
            requested: role,
        })
    }
}
