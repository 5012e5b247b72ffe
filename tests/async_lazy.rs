#![cfg(feature = "async-tokio")]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::future::Future;
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};
use std::time::{Duration, Instant};

use lazy_holder::{GetError, LazyHolder};
use tokio::sync::oneshot;

fn slow_holder(calls: &Arc<AtomicUsize>, delay: Duration) -> LazyHolder<String, String> {
   let calls = Arc::clone(calls);
   LazyHolder::new(move || {
      calls.fetch_add(1, Ordering::SeqCst);
      std::thread::sleep(delay);
      Ok(String::from("ready"))
   })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_get_until_returns_value() {
   let calls = Arc::new(AtomicUsize::new(0));
   let holder = slow_holder(&calls, Duration::from_millis(20));

   let value = holder.get_until(std::future::pending::<()>()).await;
   assert_eq!(value, Ok(&String::from("ready")));
   assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancellation_is_prompt_and_isolated() {
   let calls = Arc::new(AtomicUsize::new(0));
   let holder = slow_holder(&calls, Duration::from_secs(1));

   let patient = {
      let holder = holder.clone();
      tokio::spawn(async move {
         holder
            .get_until(std::future::pending::<()>())
            .await
            .map(Clone::clone)
            .map_err(|err| err.init_error().cloned())
      })
   };

   let (cancel_tx, cancel_rx) = oneshot::channel::<&'static str>();
   cancel_tx.send("caller gave up").unwrap();

   let start = Instant::now();
   let impatient = holder.get_until(async { cancel_rx.await.unwrap() }).await;
   assert_eq!(impatient, Err(GetError::Cancelled("caller gave up")));
   assert!(start.elapsed() < Duration::from_millis(500));

   assert_eq!(patient.await.unwrap(), Ok(String::from("ready")));
   assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_timeout_future_as_deadline() {
   let calls = Arc::new(AtomicUsize::new(0));
   let holder = slow_holder(&calls, Duration::from_millis(300));

   let early = holder
      .get_until(tokio::time::sleep(Duration::from_millis(5)))
      .await;
   assert_eq!(early, Err(GetError::Cancelled(())));
   assert!(!holder.is_done());

   let late = holder
      .get_until(tokio::time::sleep(Duration::from_secs(30)))
      .await;
   assert_eq!(late, Ok(&String::from("ready")));
   assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dropped_wait_does_not_abort_initializer() {
   let calls = Arc::new(AtomicUsize::new(0));
   let holder = slow_holder(&calls, Duration::from_millis(50));

   {
      let fut = holder.get_until(std::future::pending::<()>());
      tokio::pin!(fut);
      // Poll once to launch the initializer, then drop the wait.
      let polled = poll_once(fut.as_mut()).await;
      assert!(polled.is_none());
   }

   assert_eq!(
      holder.get_until(std::future::pending::<()>()).await,
      Ok(&String::from("ready"))
   );
   assert_eq!(calls.load(Ordering::SeqCst), 1);
}

async fn poll_once<F: std::future::Future + Unpin>(fut: F) -> Option<F::Output> {
   tokio::select! {
      biased;
      out = fut => Some(out),
      () = std::future::ready(()) => None,
   }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_exactly_once_across_tasks() {
   const TASKS: usize = 1000;

   let calls = Arc::new(AtomicUsize::new(0));
   let holder = slow_holder(&calls, Duration::from_millis(50));

   let handles: Vec<_> = (0..TASKS)
      .map(|i| {
         let holder = holder.clone();
         tokio::spawn(async move {
            if i % 2 == 0 {
               // Cancels immediately but still races for the claim.
               holder.get_until(std::future::ready(())).await.is_err()
            } else {
               holder.get_until(std::future::pending::<()>()).await.is_ok()
            }
         })
      })
      .collect();

   for (i, handle) in handles.into_iter().enumerate() {
      let outcome = handle.await.unwrap();
      if i % 2 == 1 {
         assert!(outcome, "patient task {i} did not get the value");
      }
   }
   assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_error_is_cached_across_async_callers() {
   let calls = Arc::new(AtomicUsize::new(0));
   let counter = Arc::clone(&calls);
   let holder = LazyHolder::new(move || {
      counter.fetch_add(1, Ordering::SeqCst);
      Err::<u32, _>(String::from("offline"))
   });

   let expected = String::from("offline");
   for _ in 0..3 {
      assert_eq!(
         holder.get_until(std::future::pending::<()>()).await,
         Err(GetError::Init(&expected))
      );
   }
   assert_eq!(holder.get(), Err(&expected));
   assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_current_thread_runtime() {
   let holder = LazyHolder::new(|| {
      std::thread::sleep(Duration::from_millis(20));
      Ok::<_, String>(11)
   });
   let rt = tokio::runtime::Builder::new_current_thread()
      .enable_time()
      .build()
      .unwrap();
   // The initializer lands on the blocking pool, so the single runtime thread
   // stays free to drive the wait.
   let value = rt.block_on(async { holder.get_until(std::future::pending::<()>()).await.copied() });
   assert_eq!(value, Ok(11));
}

struct NoopWake;

impl Wake for NoopWake {
   fn wake(self: Arc<Self>) {}
}

#[test]
fn test_initializer_survives_runtime_shutdown() {
   let calls = Arc::new(AtomicUsize::new(0));
   let holder = slow_holder(&calls, Duration::from_millis(200));

   let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
   let handle = rt.handle().clone();
   drop(rt);

   {
      // The runtime is gone, so its blocking pool refuses the initializer.
      let _guard = handle.enter();
      let fut = std::pin::pin!(holder.get_until(std::future::ready(())));
      let waker = Waker::from(Arc::new(NoopWake));
      let mut cx = Context::from_waker(&waker);
      assert!(matches!(
         fut.poll(&mut cx),
         Poll::Ready(Err(GetError::Cancelled(())))
      ));
   }

   // The refused initializer was relaunched on a plain thread.
   assert_eq!(
      holder.get_timeout(Duration::from_secs(5)),
      Ok(&String::from("ready"))
   );
   assert_eq!(calls.load(Ordering::SeqCst), 1);
}
