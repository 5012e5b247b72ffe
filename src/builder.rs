//! Configuration for the background initializer thread.

use std::{io, thread};

use crate::LazyHolder;

/// Configures how a [`LazyHolder`] launches its initializer, then builds it.
///
/// The initializer runs on a dedicated thread whenever the first caller may
/// stop waiting before it finishes (a deadline or cancellation signal). This
/// builder names and sizes that thread.
///
/// ```
/// use lazy_holder::Builder;
///
/// let holder = Builder::new()
///    .thread_name("config-loader")
///    .build(|| Ok::<_, std::io::Error>(String::from("loaded")));
/// assert_eq!(holder.get().unwrap(), "loaded");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Builder {
   name: Option<String>,
   stack_size: Option<usize>,
}

impl Builder {
   #[inline]
   #[must_use]
   pub fn new() -> Self {
      Self::default()
   }

   /// Names the initializer thread.
   #[must_use]
   pub fn thread_name(mut self, name: impl Into<String>) -> Self {
      self.name = Some(name.into());
      self
   }

   /// Sets the stack size of the initializer thread, in bytes.
   #[must_use]
   pub fn stack_size(mut self, size: usize) -> Self {
      self.stack_size = Some(size);
      self
   }

   /// Creates the holder. `factory` does not run until the first read.
   pub fn build<T, E, F>(self, factory: F) -> LazyHolder<T, E>
   where
      F: FnOnce() -> Result<T, E> + Send + 'static,
   {
      LazyHolder::with_options(self, Box::new(factory))
   }

   /// Spawns a detached thread running `f` with the configured options.
   pub(crate) fn spawn<F>(&self, f: F) -> io::Result<()>
   where
      F: FnOnce() + Send + 'static,
   {
      let mut builder = thread::Builder::new();
      if let Some(name) = &self.name {
         builder = builder.name(name.clone());
      }
      if let Some(size) = self.stack_size {
         builder = builder.stack_size(size);
      }
      builder.spawn(f).map(drop)
   }
}
