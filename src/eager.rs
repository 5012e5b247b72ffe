//! Holder whose factory runs at construction.

use std::time::{Duration, Instant};

use crate::{GetError, Holder};

/// A holder that runs its factory immediately.
///
/// Since the result exists before the holder is observable, reads never wait
/// and any deadline or cancellation signal is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EagerHolder<T, E> {
   result: Result<T, E>,
}

impl<T, E> EagerHolder<T, E> {
   /// Runs `factory` and caches its result.
   #[inline]
   pub fn new<F>(factory: F) -> Self
   where
      F: FnOnce() -> Result<T, E>,
   {
      Self { result: factory() }
   }

   /// Wraps an already computed result.
   #[inline]
   #[must_use]
   pub const fn from_result(result: Result<T, E>) -> Self {
      Self { result }
   }

   #[inline]
   pub fn get(&self) -> Result<&T, &E> {
      self.result.as_ref()
   }

   #[inline]
   pub fn get_deadline(&self, _deadline: Instant) -> Result<&T, GetError<'_, E>> {
      self.get().map_err(GetError::Init)
   }

   #[inline]
   pub fn get_timeout(&self, _timeout: Duration) -> Result<&T, GetError<'_, E>> {
      self.get().map_err(GetError::Init)
   }

   /// Returns the cached result without polling `cancel`.
   #[cfg(feature = "async-tokio")]
   #[inline]
   pub fn get_until<C>(
      &self,
      cancel: C,
   ) -> core::future::Ready<Result<&T, GetError<'_, E, C::Output>>>
   where
      C: core::future::Future,
   {
      drop(cancel);
      core::future::ready(self.get().map_err(GetError::Init))
   }

   /// Borrows the cached result.
   #[inline]
   pub fn result(&self) -> &Result<T, E> {
      &self.result
   }

   /// Consumes the holder, returning the cached result.
   #[inline]
   pub fn into_result(self) -> Result<T, E> {
      self.result
   }
}

impl<T, E> From<Result<T, E>> for EagerHolder<T, E> {
   #[inline]
   fn from(result: Result<T, E>) -> Self {
      Self::from_result(result)
   }
}

impl<T, E> Holder<T, E> for EagerHolder<T, E> {
   #[inline]
   fn get(&self) -> Result<&T, &E> {
      EagerHolder::get(self)
   }

   #[inline]
   fn get_deadline(&self, deadline: Instant) -> Result<&T, GetError<'_, E>> {
      EagerHolder::get_deadline(self, deadline)
   }

   #[inline]
   fn get_timeout(&self, timeout: Duration) -> Result<&T, GetError<'_, E>> {
      EagerHolder::get_timeout(self, timeout)
   }

   #[cfg(feature = "async-tokio")]
   #[inline]
   fn get_until<'a, C>(
      &'a self,
      cancel: C,
   ) -> impl core::future::Future<Output = Result<&'a T, GetError<'a, E, C::Output>>>
   where
      T: 'a,
      E: 'a,
      C: core::future::Future,
   {
      EagerHolder::get_until(self, cancel)
   }
}
