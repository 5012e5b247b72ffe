use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use lazy_holder::{EagerHolder, GetError, Holder};

#[test]
fn test_factory_runs_at_construction() {
   let calls = AtomicUsize::new(0);
   let holder = EagerHolder::new(|| {
      calls.fetch_add(1, Ordering::SeqCst);
      Ok::<_, String>(String::from("foo"))
   });
   assert_eq!(calls.load(Ordering::SeqCst), 1);

   let v1 = holder.get().unwrap();
   let v2 = holder.get().unwrap();
   assert!(std::ptr::eq(v1, v2));
   assert_eq!(v1, "foo");
   assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_error_is_kept() {
   let holder = EagerHolder::new(|| Err::<u32, _>("boom"));
   assert_eq!(holder.get(), Err(&"boom"));
   assert_eq!(holder.get(), Err(&"boom"));
   assert_eq!(holder.into_result(), Err("boom"));
}

#[test]
fn test_deadlines_are_ignored() {
   let holder = EagerHolder::from_result(Ok::<_, String>(1));
   let past = Instant::now() - Duration::from_secs(1);
   assert_eq!(holder.get_deadline(past), Ok(&1));
   assert_eq!(holder.get_timeout(Duration::ZERO), Ok(&1));

   let failed = EagerHolder::from(Err::<u32, _>(String::from("nope")));
   let expected = String::from("nope");
   assert_eq!(
      failed.get_timeout(Duration::ZERO),
      Err(GetError::Init(&expected))
   );
}

#[test]
fn test_through_trait() {
   fn first<H: Holder<u8, ()>>(holder: &H) -> Option<u8> {
      holder.get().ok().copied()
   }
   assert_eq!(first(&EagerHolder::from_result(Ok(9))), Some(9));
   assert_eq!(first(&EagerHolder::from_result(Err(()))), None);
}

#[cfg(feature = "async-tokio")]
#[tokio::test]
async fn test_cancellation_is_ignored() {
   let holder = EagerHolder::from_result(Ok::<_, String>(4));
   // An already-fired cancellation still yields the cached value.
   assert_eq!(holder.get_until(std::future::ready(())).await, Ok(&4));
}
