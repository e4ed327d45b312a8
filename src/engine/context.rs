use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::AppError;

/// Something a long computation can poll to learn it should stop.
pub trait Checkpoint {
    fn check(&self) -> Result<(), AppError>;
}

/// Never interrupts. Used for pure, unbounded calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbounded;

impl Checkpoint for Unbounded {
    fn check(&self) -> Result<(), AppError> {
        Ok(())
    }
}

/// Deadline and caller cancellation for a single request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    deadline: Instant,
    token: CancellationToken,
}

impl RequestContext {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(Instant::now() + timeout, CancellationToken::new())
    }

    pub fn new(deadline: Instant, token: CancellationToken) -> Self {
        Self { deadline, token }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

impl Checkpoint for RequestContext {
    fn check(&self) -> Result<(), AppError> {
        if self.token.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        if self.is_expired() {
            return Err(AppError::Timeout);
        }
        Ok(())
    }
}

/// How often the optimizer polls its checkpoint, counted in orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckPolicy {
    every: usize,
}

impl CheckPolicy {
    pub const DEFAULT_EVERY: usize = 1000;

    pub fn every(every: usize) -> Self {
        Self {
            every: every.max(1),
        }
    }

    pub fn interval(&self) -> usize {
        self.every
    }

    /// True before processing order `index` when a poll is due.
    pub fn due(&self, index: usize) -> bool {
        index > 0 && index % self.every == 0
    }
}

impl Default for CheckPolicy {
    fn default() -> Self {
        Self::every(Self::DEFAULT_EVERY)
    }
}
