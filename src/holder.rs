//! The capability shared by eager and lazy holders.

use std::time::{Duration, Instant};

use crate::GetError;

/// A value computed at most once, read many times.
///
/// Every read returns the same cached `Result`: either a reference to the
/// value or a reference to the factory's error. The variants differ only in
/// when the factory runs.
///
/// Both [`EagerHolder`](crate::EagerHolder) and [`LazyHolder`](crate::LazyHolder)
/// also expose these operations as inherent methods; the trait exists for code
/// that wants to be generic over the two.
pub trait Holder<T, E> {
   /// Returns the cached result, waiting for initialization as long as needed.
   fn get(&self) -> Result<&T, &E>;

   /// Returns the cached result, or gives up once `deadline` passes.
   fn get_deadline(&self, deadline: Instant) -> Result<&T, GetError<'_, E>>;

   /// Returns the cached result, or gives up after `timeout`.
   ///
   /// A timeout too large to represent as an [`Instant`] waits indefinitely.
   fn get_timeout(&self, timeout: Duration) -> Result<&T, GetError<'_, E>> {
      match deadline_after(timeout) {
         Some(deadline) => self.get_deadline(deadline),
         None => self.get().map_err(GetError::Init),
      }
   }

   /// Returns the cached result, or gives up once `cancel` resolves.
   ///
   /// The output of `cancel` is handed back in [`GetError::Cancelled`].
   #[cfg(feature = "async-tokio")]
   fn get_until<'a, C>(
      &'a self,
      cancel: C,
   ) -> impl core::future::Future<Output = Result<&'a T, GetError<'a, E, C::Output>>>
   where
      T: 'a,
      E: 'a,
      C: core::future::Future;
}

#[inline]
pub(crate) fn deadline_after(timeout: Duration) -> Option<Instant> {
   Instant::now().checked_add(timeout)
}
