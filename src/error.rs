use core::fmt;

use thiserror::Error;

/// Error returned by a read that can be cut short by its caller.
///
/// `Init` replays the factory's cached error and is returned to every caller,
/// forever. `Cancelled` belongs to one caller's wait only: it is never cached
/// and has no effect on the initializer or on other callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GetError<'a, E, C = DeadlineExceeded> {
   /// The factory failed; this is its cached error.
   Init(&'a E),
   /// The caller stopped waiting before initialization finished.
   Cancelled(C),
}

impl<'a, E, C> GetError<'a, E, C> {
   /// Returns `true` if this caller's wait was cancelled.
   #[inline]
   pub fn is_cancelled(&self) -> bool {
      matches!(self, Self::Cancelled(_))
   }

   /// Returns the cached factory error, if that is what this is.
   #[inline]
   pub fn init_error(&self) -> Option<&'a E> {
      match *self {
         Self::Init(err) => Some(err),
         Self::Cancelled(_) => None,
      }
   }
}

impl<E: fmt::Display, C: fmt::Display> fmt::Display for GetError<'_, E, C> {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      match self {
         Self::Init(err) => write!(f, "initialization failed: {err}"),
         Self::Cancelled(reason) => write!(f, "wait cancelled: {reason}"),
      }
   }
}

impl<E, C> std::error::Error for GetError<'_, E, C>
where
   E: fmt::Debug + fmt::Display,
   C: fmt::Debug + fmt::Display,
{
}

/// The deadline passed to a blocking read elapsed before initialization finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Error)]
#[error("deadline exceeded")]
pub struct DeadlineExceeded;
