use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use lazy_holder::LazyHolder;

fn main() {
   let calls = Arc::new(AtomicUsize::new(0));
   let counter = Arc::clone(&calls);
   let holder = LazyHolder::new(move || {
      // This closure runs only once
      counter.fetch_add(1, Ordering::Relaxed);
      println!("Initializing data...");
      thread::sleep(Duration::from_millis(50));
      Ok::<_, String>("Expensive data".to_string())
   });

   let threads: Vec<_> = (0..5)
      .map(|_| {
         let holder = holder.clone();
         thread::spawn(move || {
            println!("Thread access: {:?}", holder.get());
         })
      })
      .collect();

   for t in threads {
      t.join().unwrap();
   }

   assert_eq!(holder.get(), Ok(&"Expensive data".to_string()));
   assert_eq!(calls.load(Ordering::Relaxed), 1); // Initializer ran only once
}
