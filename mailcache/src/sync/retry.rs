//! # Retry
//!
//! Bounded retry counter of synchronization passes.

#[derive(Debug)]
pub enum RetryState<T, E> {
    /// The attempt succeeded.
    Ok(T),
    /// The attempt failed, another one should be made.
    Retry(E),
    /// The attempt failed and the ceiling is reached.
    Exhausted(E),
}

#[derive(Debug, Default)]
pub struct Retry {
    /// The number of failed attempts so far.
    pub attempts: usize,
    /// The number of failed attempts allowed before giving up.
    pub max_attempts: usize,
}

impl Retry {
    pub fn new(max_attempts: usize) -> Self {
        Self {
            attempts: 0,
            max_attempts,
        }
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn next<T, E>(&mut self, res: Result<T, E>) -> RetryState<T, E> {
        match res {
            Ok(res) => RetryState::Ok(res),
            Err(err) if self.attempts < self.max_attempts => {
                self.attempts += 1;
                RetryState::Retry(err)
            }
            Err(err) => RetryState::Exhausted(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Retry, RetryState};

    #[test]
    fn retry_until_ceiling() {
        let mut retry = Retry::new(2);

        assert!(matches!(retry.next::<(), _>(Err(1)), RetryState::Retry(1)));
        assert!(matches!(retry.next::<(), _>(Err(2)), RetryState::Retry(2)));
        assert!(matches!(retry.next::<(), _>(Err(3)), RetryState::Exhausted(3)));
        assert_eq!(retry.attempts, 2);

        retry.reset();
        assert!(matches!(retry.next::<_, ()>(Ok(4)), RetryState::Ok(4)));
        assert!(matches!(retry.next::<(), _>(Err(5)), RetryState::Retry(5)));
    }
}
