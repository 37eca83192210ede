//! POV Store - in-memory engagement aggregate
//!
//! The read model every view consumes:
//! - [`Action`]: closed vocabulary of state transitions
//! - [`apply`]: pure, infallible reducer
//! - [`AggregateStore`]: shared handle that serialises transitions and
//!   publishes a revision counter
//!
//! # Example
//!
//! ```rust
//! use pov_store::{Action, AggregateStore};
//!
//! let store = AggregateStore::new();
//! store.dispatch(Action::SetLoading(true));
//! assert!(store.read(|s| s.loading));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod action;
pub mod item;
pub mod reducer;
pub mod store;

pub use action::{Action, CollectionAction};
pub use item::CollectionItem;
pub use reducer::{apply, StoreState};
pub use store::AggregateStore;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
