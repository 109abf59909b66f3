use std::thread;
use std::time::Duration;

/// Something that can block the caller for a while.
///
/// Every settle and retry delay in this crate goes through this trait, so a
/// caller can substitute a clock that records instead of sleeping.
pub trait Sleep {
    /// Block for `duration`.
    fn sleep(&mut self, duration: Duration);
}

/// Sleeps the current thread.
#[derive(Copy, Clone, Debug, Default)]
pub struct ThreadSleep;

impl Sleep for ThreadSleep {
    fn sleep(&mut self, duration: Duration) {
        thread::sleep(duration)
    }
}

impl<'a, S: Sleep + ?Sized> Sleep for &'a mut S {
    fn sleep(&mut self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// A bounded number of attempts with a fixed pause between them.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Pause associated with each attempt.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Creates a new policy. At least one attempt is always made.
    pub fn new(attempts: u32, delay: Duration) -> Self {
        RetryPolicy {
            attempts: attempts.max(1),
            delay: delay,
        }
    }

    /// Runs `f` until it succeeds, pausing between failed attempts.
    ///
    /// Returns the last error once every attempt has failed. `f` receives the
    /// zero-based attempt number.
    pub fn retry<S, T, E, F>(&self, sleep: &mut S, mut f: F) -> Result<T, E> where
        S: Sleep + ?Sized,
        F: FnMut(u32) -> Result<T, E>,
    {
        let mut attempt = 0;
        loop {
            match f(attempt) {
                Ok(v) => return Ok(v),
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.attempts.max(1) {
                        return Err(e)
                    }
                    sleep.sleep(self.delay);
                },
            }
        }
    }

    /// Runs `f` until it yields a value, pausing before every attempt.
    pub fn poll<S, T, F>(&self, sleep: &mut S, mut f: F) -> Option<T> where
        S: Sleep + ?Sized,
        F: FnMut(u32) -> Option<T>,
    {
        for attempt in 0..self.attempts.max(1) {
            sleep.sleep(self.delay);
            if let Some(v) = f(attempt) {
                return Some(v)
            }
        }

        None
    }
}

/// Records requested delays instead of sleeping.
#[cfg(test)]
#[derive(Clone, Debug, Default)]
pub struct RecordSleep {
    /// Every requested delay, in order.
    pub slept: Vec<Duration>,
}

#[cfg(test)]
impl Sleep for RecordSleep {
    fn sleep(&mut self, duration: Duration) {
        self.slept.push(duration)
    }
}
