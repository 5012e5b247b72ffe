//! Completion gate backing [`LazyHolder`](crate::LazyHolder).
//!
//! The gate plays two roles at once: it is the once-only claim that decides
//! which caller launches the initializer, and it is the broadcast completion
//! signal every reader waits on. Its state is packed into a single `AtomicU8`:
//!
//! - Bit 0: RUNNING - The initializer has been claimed and is in flight
//! - Bit 1: DONE - The result slot is written and published
//! - Bit 2: POISONED - The initializer panicked before publishing a result
//! - Bit 3: WAITING - At least one thread is parked on the gate
//!
//! The only transitions are `0 -> RUNNING` (claim, exactly once) and
//! `RUNNING -> DONE | POISONED` (terminal, never reset). Blocking waiters park
//! through `parking_lot_core`; async waiters are woken through a tokio `Notify`.

use core::mem;
use core::sync::atomic::{AtomicU8, Ordering};
use std::time::Instant;

use parking_lot_core::{ParkResult, DEFAULT_PARK_TOKEN, DEFAULT_UNPARK_TOKEN};

/// Terminal state of a gate, as seen by a reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
   /// The result slot holds the factory's output.
   Done,
   /// The factory panicked; no result will ever be published.
   Poisoned,
}

pub(crate) struct Gate {
   state: AtomicU8,
   #[cfg(feature = "async-tokio")]
   notify: tokio::sync::Notify,
}

impl Gate {
   /// Bit flag: Initializer claimed and running.
   const RUNNING: u8 = 1;
   /// Bit flag: Result published.
   const DONE: u8 = 2;
   /// Bit flag: Initializer panicked.
   const POISONED: u8 = 4;
   /// Bit flag: At least one thread is parked.
   const WAITING: u8 = 8;

   /// Creates a gate in the unstarted state.
   pub(crate) fn new() -> Self {
      Self {
         state: AtomicU8::new(0),
         #[cfg(feature = "async-tokio")]
         notify: tokio::sync::Notify::new(),
      }
   }

   #[inline(always)]
   const fn outcome_of(state: u8) -> Option<Outcome> {
      if state & Self::DONE != 0 {
         Some(Outcome::Done)
      } else if state & Self::POISONED != 0 {
         Some(Outcome::Poisoned)
      } else {
         None
      }
   }

   /// Returns the terminal state, or `None` while unstarted or running.
   ///
   /// Acquire pairs with the Release in `finish`, so a `Done` observed here
   /// makes the result slot visible to the caller.
   #[inline]
   pub(crate) fn outcome(&self) -> Option<Outcome> {
      Self::outcome_of(self.state.load(Ordering::Acquire))
   }

   #[inline]
   pub(crate) fn is_done(&self) -> bool {
      self.state.load(Ordering::Acquire) & Self::DONE != 0
   }

   /// Attempts the one and only `0 -> RUNNING` transition.
   ///
   /// Returns `true` for exactly one caller over the lifetime of the gate. The
   /// winner must eventually hand the gate to a [`Claim`].
   #[inline]
   pub(crate) fn try_claim(&self) -> bool {
      // WAITING is only ever set on a RUNNING gate, so an unstarted gate is
      // always exactly zero.
      self
         .state
         .compare_exchange(0, Self::RUNNING, Ordering::Acquire, Ordering::Relaxed)
         .is_ok()
   }

   #[inline]
   fn key(&self) -> usize {
      self.state.as_ptr() as usize
   }

   /// Publishes a terminal state and wakes every waiter.
   fn finish(&self, terminal: u8) {
      // Release orders the result write before any Acquire load that sees DONE.
      let prev = self.state.swap(terminal, Ordering::Release);
      debug_assert!(prev & Self::RUNNING != 0, "gate finished without a claim");

      if prev & Self::WAITING != 0 {
         // SAFETY: The key is the address of `state`, the same one `park` uses.
         unsafe {
            parking_lot_core::unpark_all(self.key(), DEFAULT_UNPARK_TOKEN);
         }
      }

      #[cfg(feature = "async-tokio")]
      self.notify.notify_waiters();
   }

   /// Parks until a terminal state is reached or `deadline` passes.
   ///
   /// Returns `None` only if the deadline passed first.
   fn park_until(&self, deadline: Option<Instant>) -> Option<Outcome> {
      loop {
         let state = self.state.load(Ordering::Acquire);
         if let Some(outcome) = Self::outcome_of(state) {
            return Some(outcome);
         }

         if state & Self::WAITING == 0
            && self
               .state
               .compare_exchange_weak(
                  state,
                  state | Self::WAITING,
                  Ordering::Relaxed,
                  Ordering::Relaxed,
               )
               .is_err()
         {
            // State moved under us, possibly to a terminal one. Re-read.
            std::hint::spin_loop();
            continue;
         }

         let expected = state | Self::WAITING;
         // SAFETY: See `finish`. The validate closure re-checks the state under
         // the bucket lock, so a concurrent `finish` cannot be missed.
         let result = unsafe {
            parking_lot_core::park(
               self.key(),
               || self.state.load(Ordering::Acquire) == expected,
               || {},
               |_, _| {},
               DEFAULT_PARK_TOKEN,
               deadline,
            )
         };

         if let ParkResult::TimedOut = result {
            // The deadline won, unless the gate finished in the meantime.
            return self.outcome();
         }
      }
   }

   /// Blocks until a terminal state is reached.
   pub(crate) fn wait(&self) -> Outcome {
      loop {
         if let Some(outcome) = self.park_until(None) {
            return outcome;
         }
      }
   }

   /// Blocks until a terminal state is reached or `deadline` passes.
   pub(crate) fn wait_deadline(&self, deadline: Instant) -> Option<Outcome> {
      self.park_until(Some(deadline))
   }

   /// Waits for a terminal state or for `cancel` to resolve, whichever is first.
   ///
   /// When both are ready, completion wins. Dropping the returned future only
   /// abandons this wait.
   #[cfg(feature = "async-tokio")]
   pub(crate) async fn wait_until<C>(&self, cancel: C) -> Result<Outcome, C::Output>
   where
      C: core::future::Future,
   {
      let notified = self.notify.notified();
      tokio::pin!(notified, cancel);

      loop {
         // Register before checking, so a `notify_waiters` racing with the
         // check below still wakes us.
         notified.as_mut().enable();
         if let Some(outcome) = self.outcome() {
            return Ok(outcome);
         }

         tokio::select! {
            biased;
            () = &mut notified => notified.set(self.notify.notified()),
            output = &mut cancel => return Err(output),
         }
      }
   }
}

/// Proof that the caller won [`Gate::try_claim`].
///
/// Must be [`complete`](Claim::complete)d once the result slot is written. If
/// dropped instead (the initializer unwound), the gate is poisoned and all
/// waiters are released.
pub(crate) struct Claim<'a> {
   gate: &'a Gate,
}

impl<'a> Claim<'a> {
   /// Wraps a gate whose RUNNING bit the caller has already set.
   #[inline(always)]
   pub(crate) fn new(gate: &'a Gate) -> Self {
      debug_assert!(
         gate.state.load(Ordering::Relaxed) & Gate::RUNNING != 0,
         "claim taken on a gate that is not running"
      );
      Self { gate }
   }

   /// Marks the result as published and wakes all waiters.
   #[inline(always)]
   pub(crate) fn complete(self) {
      self.gate.finish(Gate::DONE);
      mem::forget(self);
   }
}

impl Drop for Claim<'_> {
   fn drop(&mut self) {
      log::error!("lazy initializer unwound without a result; holder is poisoned");
      self.gate.finish(Gate::POISONED);
   }
}
