use lazy_holder::{GetError, LazyHolder};
use tokio::time::{sleep, Duration};

#[tokio::main]
async fn main() {
   let holder = LazyHolder::new(|| {
      println!("Initializing async data...");
      std::thread::sleep(std::time::Duration::from_millis(100));
      Ok::<_, String>("Async expensive data".to_string())
   });

   let tasks: Vec<_> = (0..5u64)
      .map(|i| {
         let holder = holder.clone();
         tokio::spawn(async move {
            // Odd tasks only wait 10ms; even tasks wait as long as needed.
            let patience = if i % 2 == 1 { 10 } else { 10_000 };
            match holder.get_until(sleep(Duration::from_millis(patience))).await {
               Ok(v) => println!("Task {i} got: {v}"),
               Err(GetError::Cancelled(())) => println!("Task {i} gave up"),
               Err(GetError::Init(e)) => println!("Task {i} saw failure: {e}"),
            }
         })
      })
      .collect();

   for t in tasks {
      t.await.unwrap();
   }

   assert!(holder.is_done());
}
