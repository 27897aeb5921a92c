//! Room actor event handlers.
//!
//! Each submodule handles a category of [`RoomEvent`](super::RoomEvent)
//! messages processed by [`RoomActor`](super::RoomActor).

use super::*;

pub mod admit;
pub mod broadcast;
pub mod leave;
pub mod relay;
