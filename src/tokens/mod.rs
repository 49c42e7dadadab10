//! Token value objects.
//!
//! - [`AccessToken`]: short-lived, carries the application payload
//! - [`RefreshToken`]: long-lived, tracked in the store, bound to one access token

pub mod access;
pub mod refresh;

pub use access::{AccessToken, NewAccessToken};
pub use refresh::{NewRefreshToken, RefreshToken};
