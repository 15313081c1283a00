use std::thread;
use std::time::Duration;

/// Blocking pause between polling attempts.
pub trait Sleep {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleep;

impl Sleep for ThreadSleep {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}
