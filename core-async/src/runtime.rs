//! Runtime utilities.

pub use tokio::runtime::{Builder, Handle, Runtime};

/// Runs a future to completion on a fresh current-thread runtime.
///
/// Fails when the runtime cannot be built (for example when the process is
/// out of file descriptors for the I/O driver).
pub fn block_on<F>(future: F) -> std::io::Result<F::Output>
where
    F: std::future::Future,
{
    let runtime = Builder::new_current_thread().enable_all().build()?;
    Ok(runtime.block_on(future))
}

/// Returns a handle to the runtime the caller is running on, if any.
pub fn current() -> Option<Handle> {
    Handle::try_current().ok()
}
