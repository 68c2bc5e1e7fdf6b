//! Hexagonal ports: the custody API and the collaborators it drives.

pub mod inbound;
pub mod outbound;
