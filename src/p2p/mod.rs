//! P2P module - outbound block announcements

mod broadcast;

pub use broadcast::*;
