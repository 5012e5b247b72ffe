//! Compute-once value holders with cached failures and cancellable waits.
//!
//! This crate provides two holders behind one [`Holder`] trait:
//!
//! - [`EagerHolder<T, E>`]: Runs its factory at construction.
//! - [`LazyHolder<T, E>`]: Runs its factory on first read, exactly once, no
//!   matter how many threads or tasks ask at the same time.
//!
//! A factory returns `Result<T, E>`, and that result is what gets cached. A
//! failed factory stays failed: its error is replayed to every reader and the
//! factory is never retried.
//!
//! Reads on a `LazyHolder` can be bounded by a deadline or, in async code, by
//! any cancellation future. Giving up only ends that caller's wait; the
//! initializer keeps running and serves everyone else.
//!
//! # Features
//!
//! - **Lock-free fast path**: Reading a finished holder is a single atomic load.
//! - **Thundering-herd safe**: Concurrent first readers share one initializer.
//! - **Cancellable waits**: Deadlines for threads, arbitrary futures for tasks.
//! - **Async support**: `get_until` with the `async-tokio` feature (default).
//!
//! # Examples
//!
//! ## Lazy, failing once
//!
//! ```rust
//! use lazy_holder::LazyHolder;
//!
//! let holder = LazyHolder::new(|| "not a number".parse::<u32>());
//!
//! // The error is computed once and cached.
//! let first = holder.get().unwrap_err().clone();
//! assert_eq!(holder.get(), Err(&first));
//! ```
//!
//! ## Bounded wait
//!
//! ```rust
//! use std::time::Duration;
//!
//! use lazy_holder::{DeadlineExceeded, GetError, LazyHolder};
//!
//! let holder = LazyHolder::new(|| {
//!     std::thread::sleep(Duration::from_millis(200));
//!     Ok::<_, String>("ready")
//! });
//!
//! // This caller gives up, the initializer does not.
//! assert_eq!(
//!     holder.get_timeout(Duration::from_millis(1)),
//!     Err(GetError::Cancelled(DeadlineExceeded))
//! );
//! assert_eq!(holder.get(), Ok(&"ready"));
//! ```

/// Initializer thread configuration.
mod builder;

/// Eager holder implementation.
mod eager;

/// Error types.
mod error;

/// The shared holder trait.
mod holder;

/// Lazy holder implementation.
mod lazy;

/// Internal claim and completion gate.
mod state;

pub use builder::Builder;
pub use eager::EagerHolder;
pub use error::{DeadlineExceeded, GetError};
pub use holder::Holder;
pub use lazy::LazyHolder;
