use std::time::Duration;

use lazy_holder::{Builder, GetError};

fn main() {
   let holder = Builder::new()
      .thread_name("slow-init")
      .build(|| {
         println!("Connecting to a slow backend...");
         std::thread::sleep(Duration::from_millis(300));
         Err::<String, _>("backend unreachable")
      });

   // First caller is impatient and gives up.
   match holder.get_timeout(Duration::from_millis(10)) {
      Err(GetError::Cancelled(e)) => println!("Gave up waiting: {e}"),
      other => panic!("Expected a timeout, got {other:?}"),
   }

   // The initializer kept running; its failure is cached for everyone.
   for _ in 0..2 {
      match holder.get_timeout(Duration::from_secs(5)) {
         Err(GetError::Init(e)) => println!("Cached failure: {e}"),
         other => panic!("Expected the cached error, got {other:?}"),
      }
   }
}
