//! Holder whose factory runs on first read.
//!
//! A [`LazyHolder`] defers its factory until a value is first requested, then
//! guarantees the factory runs exactly once no matter how many callers race
//! for it. The outcome, success or failure, is cached for good.
//!
//! Reads come in three flavors:
//!
//! - [`get`](LazyHolder::get) waits as long as it takes. If it is the first
//!   read, the factory runs inline on the calling thread.
//! - [`get_deadline`](LazyHolder::get_deadline) and
//!   [`get_timeout`](LazyHolder::get_timeout) block until completion or a
//!   deadline. The factory runs on a background thread so the caller can walk
//!   away without aborting it.
//! - [`get_until`](LazyHolder::get_until) is the async counterpart, racing
//!   completion against an arbitrary cancellation future.
//!
//! Giving up only ever affects the caller that gave up. The initializer keeps
//! running and its result is served to everyone who asks afterwards.

use core::cell::UnsafeCell;
use core::fmt;
use core::mem::MaybeUninit;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::holder::deadline_after;
use crate::state::{Claim, Gate, Outcome};
use crate::{Builder, DeadlineExceeded, GetError, Holder};

type Factory<T, E> = Box<dyn FnOnce() -> Result<T, E> + Send>;

struct Inner<T, E> {
   gate: Gate,
   factory: UnsafeCell<Option<Factory<T, E>>>,
   result: UnsafeCell<MaybeUninit<Result<T, E>>>,
   options: Builder,
}

impl<T, E> Inner<T, E> {
   /// Runs the factory and publishes its result.
   ///
   /// # Safety
   ///
   /// The caller must have won `Gate::try_claim` on this gate, and `run` must
   /// be called at most once.
   unsafe fn run(&self) {
      let claim = Claim::new(&self.gate);
      // SAFETY: The claim grants exclusive access to the factory slot.
      let factory = unsafe { (*self.factory.get()).take() };
      let Some(factory) = factory else {
         // Only a second `run` finds the slot empty, which the contract rules out.
         unreachable!("lazy initializer ran twice");
      };

      log::debug!("running lazy initializer");
      let result = factory();
      match &result {
         Ok(_) => log::debug!("lazy initializer finished"),
         Err(_) => log::debug!("lazy initializer failed; caching the error"),
      }

      // SAFETY: Exclusive access as above; nobody reads the slot before DONE.
      unsafe { (*self.result.get()).write(result) };
      claim.complete();
   }

   /// # Safety
   ///
   /// The gate must have been observed `Done` with Acquire ordering.
   #[inline]
   unsafe fn cached(&self) -> Result<&T, &E> {
      debug_assert!(self.gate.is_done(), "cached read on unfinished holder");
      // SAFETY: DONE is published after the slot is written, and the slot is
      // never written again.
      unsafe { (*self.result.get()).assume_init_ref().as_ref() }
   }
}

impl<T, E> Drop for Inner<T, E> {
   fn drop(&mut self) {
      if self.gate.is_done() {
         // SAFETY: The slot is initialized and we have exclusive access.
         unsafe { self.result.get_mut().assume_init_drop() };
      }
   }
}

// SAFETY:
// The factory slot is only touched by the single claim winner. The result
// slot is written once, before DONE is released, and only read afterwards, so
// sharing `&Inner` hands out `&T`/`&E` across threads (requiring `Sync`) and
// may move the result to the initializer's thread or drop it elsewhere
// (requiring `Send`).
unsafe impl<T: Send + Sync, E: Send + Sync> Sync for Inner<T, E> {}

/// A holder that runs its factory on first read, exactly once.
///
/// Cloning a `LazyHolder` is cheap and yields another handle to the same
/// cell: all clones share one factory, one initialization, one result.
///
/// # Panics
///
/// If the factory panics, the holder is poisoned: every current and future
/// read panics. The factory is never re-run.
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// use lazy_holder::LazyHolder;
///
/// let calls = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&calls);
/// let holder = LazyHolder::new(move || {
///    counter.fetch_add(1, Ordering::SeqCst);
///    Ok::<_, String>("foo")
/// });
///
/// assert_eq!(calls.load(Ordering::SeqCst), 0);
/// assert_eq!(holder.get(), Ok(&"foo"));
/// assert_eq!(holder.get(), Ok(&"foo"));
/// assert_eq!(calls.load(Ordering::SeqCst), 1);
/// ```
pub struct LazyHolder<T, E> {
   inner: Arc<Inner<T, E>>,
}

impl<T, E> LazyHolder<T, E> {
   /// Creates a holder around `factory` without running it.
   ///
   /// Use [`Builder`] to configure the initializer thread.
   #[inline]
   pub fn new<F>(factory: F) -> Self
   where
      F: FnOnce() -> Result<T, E> + Send + 'static,
   {
      Builder::new().build(factory)
   }

   pub(crate) fn with_options(options: Builder, factory: Factory<T, E>) -> Self {
      Self {
         inner: Arc::new(Inner {
            gate: Gate::new(),
            factory: UnsafeCell::new(Some(factory)),
            result: UnsafeCell::new(MaybeUninit::uninit()),
            options,
         }),
      }
   }

   /// Checks whether the result has been published.
   ///
   /// This method never blocks.
   #[inline]
   pub fn is_done(&self) -> bool {
      self.inner.gate.is_done()
   }

   /// Returns the cached result if initialization has finished.
   ///
   /// Returns `None` while unstarted or running. Never blocks and never
   /// starts the initializer.
   #[inline]
   pub fn try_get(&self) -> Option<Result<&T, &E>> {
      self.inner.gate.outcome().map(|outcome| self.resolve(outcome))
   }

   /// Returns the cached result, initializing it on this thread if needed.
   ///
   /// If another caller already started the initializer, blocks until it
   /// finishes.
   #[inline]
   pub fn get(&self) -> Result<&T, &E> {
      if let Some(result) = self.try_get() {
         return result;
      }
      self.get_slow()
   }

   #[cold]
   fn get_slow(&self) -> Result<&T, &E> {
      if self.inner.gate.try_claim() {
         // SAFETY: We just won the claim.
         unsafe { self.inner.run() };
      }
      self.resolve(self.inner.gate.wait())
   }

   #[inline]
   fn resolve(&self, outcome: Outcome) -> Result<&T, &E> {
      match outcome {
         // SAFETY: `outcome` comes from an Acquire load that saw DONE.
         Outcome::Done => unsafe { self.inner.cached() },
         Outcome::Poisoned => poisoned(),
      }
   }
}

impl<T, E> LazyHolder<T, E>
where
   T: Send + Sync + 'static,
   E: Send + Sync + 'static,
{
   /// Returns the cached result, or gives up once `deadline` passes.
   ///
   /// The first caller launches the initializer on a background thread. A
   /// caller that gives up gets [`GetError::Cancelled`]; the initializer runs
   /// on and later callers receive its result.
   pub fn get_deadline(&self, deadline: Instant) -> Result<&T, GetError<'_, E>> {
      if let Some(result) = self.try_get() {
         return result.map_err(GetError::Init);
      }

      if self.inner.gate.try_claim() {
         // SAFETY: We just won the claim.
         unsafe { self.spawn_initializer() };
      }

      match self.inner.gate.wait_deadline(deadline) {
         Some(outcome) => self.resolve(outcome).map_err(GetError::Init),
         None => {
            log::debug!("lazy holder wait hit its deadline; initializer keeps running");
            Err(GetError::Cancelled(DeadlineExceeded))
         }
      }
   }

   /// Returns the cached result, or gives up after `timeout`.
   ///
   /// A timeout too large to represent as an [`Instant`] waits indefinitely.
   pub fn get_timeout(&self, timeout: Duration) -> Result<&T, GetError<'_, E>> {
      match deadline_after(timeout) {
         Some(deadline) => self.get_deadline(deadline),
         None => self.get().map_err(GetError::Init),
      }
   }

   /// Returns the cached result, or gives up once `cancel` resolves.
   ///
   /// The first caller launches the initializer on tokio's blocking pool (or
   /// a plain thread outside a runtime). If `cancel` resolves first, its
   /// output is returned in [`GetError::Cancelled`]. Dropping the returned
   /// future is equally harmless: the initializer is never aborted.
   ///
   /// ```
   /// # #[tokio::main(flavor = "current_thread")]
   /// # async fn main() {
   /// use std::time::Duration;
   ///
   /// use lazy_holder::{GetError, LazyHolder};
   ///
   /// let holder = LazyHolder::new(|| {
   ///    std::thread::sleep(Duration::from_millis(200));
   ///    Ok::<_, String>(7)
   /// });
   ///
   /// let impatient = holder.get_until(tokio::time::sleep(Duration::from_millis(1))).await;
   /// assert_eq!(impatient, Err(GetError::Cancelled(())));
   ///
   /// assert_eq!(holder.get_until(std::future::pending::<()>()).await, Ok(&7));
   /// # }
   /// ```
   #[cfg(feature = "async-tokio")]
   pub async fn get_until<C>(&self, cancel: C) -> Result<&T, GetError<'_, E, C::Output>>
   where
      C: core::future::Future,
   {
      if let Some(result) = self.try_get() {
         return result.map_err(GetError::Init);
      }

      if self.inner.gate.try_claim() {
         // SAFETY: We just won the claim.
         unsafe { self.spawn_initializer_async() };
      }

      match self.inner.gate.wait_until(cancel).await {
         Ok(outcome) => self.resolve(outcome).map_err(GetError::Init),
         Err(output) => {
            log::debug!("lazy holder wait was cancelled; initializer keeps running");
            Err(GetError::Cancelled(output))
         }
      }
   }

   /// Launches the initializer on a dedicated thread.
   ///
   /// # Safety
   ///
   /// The caller must have just won `Gate::try_claim`.
   unsafe fn spawn_initializer(&self) {
      // SAFETY: Forwarded from our caller.
      unsafe { launch_thread(Arc::clone(&self.inner)) };
   }

   /// Launches the initializer on tokio's blocking pool if a runtime is
   /// available, otherwise on a dedicated thread.
   ///
   /// # Safety
   ///
   /// The caller must have just won `Gate::try_claim`.
   #[cfg(feature = "async-tokio")]
   unsafe fn spawn_initializer_async(&self) {
      match tokio::runtime::Handle::try_current() {
         Ok(handle) => {
            let launch = Launch {
               inner: Some(Arc::clone(&self.inner)),
            };
            // A runtime that is shutting down drops the closure unrun; the
            // `Launch` drop then relaunches on a plain thread.
            drop(handle.spawn_blocking(move || launch.run()));
            log::debug!("lazy initializer handed to the blocking pool");
         }
         // SAFETY: Forwarded from our caller.
         Err(_) => unsafe { self.spawn_initializer() },
      }
   }
}

/// Runs the initializer on a dedicated thread, or inline if no thread can be
/// spawned.
///
/// # Safety
///
/// The claim on `inner`'s gate must have been won and not yet used.
unsafe fn launch_thread<T, E>(inner: Arc<Inner<T, E>>)
where
   T: Send + Sync + 'static,
   E: Send + Sync + 'static,
{
   let task = Arc::clone(&inner);
   // SAFETY: The claim moves into the spawned thread.
   let spawned = inner.options.spawn(move || unsafe { task.run() });
   match spawned {
      Ok(()) => log::debug!("lazy initializer launched on a background thread"),
      Err(err) => {
         log::warn!("failed to spawn lazy initializer thread, running inline: {err}");
         // SAFETY: The closure was dropped unrun, so the claim is still ours.
         unsafe { inner.run() };
      }
   }
}

/// A won claim travelling to the blocking pool.
///
/// Runs the initializer exactly once: either from the pool via `run`, or,
/// if the pool drops it unrun, from a fresh thread on drop.
#[cfg(feature = "async-tokio")]
struct Launch<T, E>
where
   T: Send + Sync + 'static,
   E: Send + Sync + 'static,
{
   inner: Option<Arc<Inner<T, E>>>,
}

#[cfg(feature = "async-tokio")]
impl<T, E> Launch<T, E>
where
   T: Send + Sync + 'static,
   E: Send + Sync + 'static,
{
   fn run(mut self) {
      if let Some(inner) = self.inner.take() {
         // SAFETY: A `Launch` is only built by the claim winner.
         unsafe { inner.run() };
      }
   }
}

#[cfg(feature = "async-tokio")]
impl<T, E> Drop for Launch<T, E>
where
   T: Send + Sync + 'static,
   E: Send + Sync + 'static,
{
   fn drop(&mut self) {
      if let Some(inner) = self.inner.take() {
         log::warn!("blocking pool dropped the lazy initializer unrun, relaunching on a thread");
         // SAFETY: The claim was never used.
         unsafe { launch_thread(inner) };
      }
   }
}

#[cold]
#[track_caller]
fn poisoned() -> ! {
   panic!("LazyHolder initializer panicked")
}

impl<T, E> Clone for LazyHolder<T, E> {
   #[inline]
   fn clone(&self) -> Self {
      Self {
         inner: Arc::clone(&self.inner),
      }
   }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for LazyHolder<T, E> {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      let mut d = f.debug_tuple("LazyHolder");
      match self.inner.gate.outcome() {
         // SAFETY: Observed DONE with Acquire ordering.
         Some(Outcome::Done) => d.field(&unsafe { self.inner.cached() }),
         Some(Outcome::Poisoned) => d.field(&format_args!("<poisoned>")),
         None => d.field(&format_args!("<uninit>")),
      };
      d.finish()
   }
}

impl<T, E> Holder<T, E> for LazyHolder<T, E>
where
   T: Send + Sync + 'static,
   E: Send + Sync + 'static,
{
   #[inline]
   fn get(&self) -> Result<&T, &E> {
      LazyHolder::get(self)
   }

   #[inline]
   fn get_deadline(&self, deadline: Instant) -> Result<&T, GetError<'_, E>> {
      LazyHolder::get_deadline(self, deadline)
   }

   #[inline]
   fn get_timeout(&self, timeout: Duration) -> Result<&T, GetError<'_, E>> {
      LazyHolder::get_timeout(self, timeout)
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
      LazyHolder::get_until(self, cancel)
   }
}
