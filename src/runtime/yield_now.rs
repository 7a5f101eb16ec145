use crate::future::Callback;
use crate::coro::Task;
use crate::runtime::IoLoop;

/// Cooperative scheduler hint: gives the loop one turn before resuming.
///
/// Every other callback already queued on the current loop runs before the
/// computation continues.
///
/// # Panics
/// The returned task panics when it begins outside of a running [`IoLoop`].
pub fn yield_now() -> Task {
    Task::new(|callback: Callback| {
        IoLoop::current().add_callback(move || {
            callback.notify();
            Ok(())
        });
        Ok(())
    })
}
