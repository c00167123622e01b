use std::time::Duration;

/// Provides a mechanism for managing attempting to complete an operation
/// and retrying the operation, with a backoff, if it fails.
///
/// This iterator provides an infinite stream of back off durations, where
/// the duration increases an exponential factor up to some maximum delay.
/// Upon reaching the maximum delay, that value will be returned from then
/// on. Use `Iterator::take` to bound the number of attempts.
///
/// The [Retry] functions use [std::thread::sleep] for the delay; so, in its
/// current design, do NOT use this with asynchronous code (e.g. `tokio`).
pub struct ExponentialBackoff {
    curr: Duration,
    max: Duration,
    factor: u32,
}

impl ExponentialBackoff {
    pub fn new(start: Duration, max: Duration, factor: u32) -> ExponentialBackoff {
        ExponentialBackoff {
            curr: start,
            max,
            factor,
        }
    }
}

impl Iterator for ExponentialBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        let new_next = self.curr * self.factor;

        self.curr = if new_next > self.max {
            self.max
        } else {
            new_next
        };

        Some(self.curr)
    }
}

/// The Retry trait provides a protocol for handling retrying a function with a
/// [Result] type until either it succeeds or the [Iterator] completes. The
/// iterator yields the amount of time to wait between each attempt.
pub trait Retry: Iterator<Item = Duration> + Sized {
    /// Retry the given function until it returns [Ok]. If the [Iterator]
    /// finishes without a successful execution of `f` then the last [Err] is
    /// returned to the user, or `None` if there was no attempt at all.
    ///
    /// - `f` is the function which will be executed until an [Ok] is returned or the underlying
    /// iterator is empty
    /// - `sleep` is called after every failed attempt but the last and is used to handle
    /// the delay before the next attempt.  In addition, the error from the last attempt
    /// is provided so that you may log information.
    fn retry<F, S, T, E>(&mut self, mut f: F, sleep: S) -> Option<Result<T, E>>
    where
        F: FnMut() -> Result<T, E>,
        S: Fn(&E, Duration),
    {
        let mut last_err = None;
        let mut iter = self.peekable();

        while let Some(delay) = iter.next() {
            match f() {
                Ok(v) => return Some(Ok(v)),
                Err(e) => {
                    if iter.peek().is_some() {
                        sleep(&e, delay);
                    }
                    last_err = Some(Err(e));
                }
            }
        }
        last_err
    }
}

impl<I: Iterator<Item = Duration>> Retry for I {}
