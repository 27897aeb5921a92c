//! Session state.
//!
//! The [`Hub`](hub::Hub) owns the registry of live rooms; each
//! [`RoomActor`](room::RoomActor) owns the membership of one session.

pub mod hub;
pub mod room;

#[cfg(test)]
pub(crate) mod test_support;

pub use hub::{Hub, HubHandle, HubStats};
pub use room::{ConnId, RoomHandle};
