//! Russian-speaking chat assistant that recommends beer.
//!
//! Messages go through [`conversation::Conversations`], which keeps one session per
//! chat and lets [`conversation::Router`] decide the replies. Product requests are
//! answered by [`matcher::Matcher`], a nearest-neighbour search over the indicator
//! vectors built in [`model`].

pub mod conversation;
pub mod error;
pub mod intents;
pub mod matcher;
pub mod model;
pub mod preprocess;
pub mod server;
pub mod services;
pub mod settings;
pub mod startup;

pub use error::{Error, Result};
