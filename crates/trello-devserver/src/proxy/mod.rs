//! Upstream forwarding for the two proxy categories: the Trello REST API
//! and the avatar host.

pub mod forward;
