//! Synchronization primitives.
//!
//! Async-aware locks and channels come from `tokio::sync`; cooperative
//! cancellation comes from `tokio_util`. Use these for state that is held
//! across `.await` points. Short critical sections that never suspend are
//! better served by `parking_lot`.
//!
//! ```rust
//! use core_async::sync::{mpsc, Mutex};
//!
//! async fn example() {
//!     let guard = Mutex::new(vec![1, 2, 3]);
//!     guard.lock().await.push(4);
//!
//!     let (tx, mut rx) = mpsc::unbounded_channel();
//!     tx.send(guard.lock().await.len()).ok();
//!     assert_eq!(rx.recv().await, Some(4));
//! }
//! ```

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, Mutex, MutexGuard, Notify, OwnedMutexGuard, RwLock,
    Semaphore,
};
pub use tokio_util::sync::{CancellationToken, DropGuard};
