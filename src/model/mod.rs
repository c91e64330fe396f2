//! Domain types. Everything here is de/serialisable, and stored in the
//! database in the same shape as it is sent over the API.

pub mod audit;
pub mod candidate;
pub mod election;
pub mod mongodb;
pub mod results;
pub mod session;
pub mod vote;
pub mod voter;
