use async_trait::async_trait;
use std::{fmt::Debug, time::Duration};

use crate::model::Position;

/// One-shot fix parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationOptions {
    pub timeout: Duration,
    /// Oldest cached fix a provider may hand back instead of acquiring a new one.
    pub maximum_age: Duration,
}

impl Default for LocationOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(72),
            maximum_age: Duration::from_secs(2000),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Location service unavailable")]
    Unavailable,
    #[error("Location request timed out")]
    Timeout,
    #[error("Location error: {0}")]
    Other(String),
}

#[async_trait]
pub trait LocationProvider: Send + Sync + Debug {
    async fn current_position(&self, options: &LocationOptions) -> Result<Position, LocationError>;
}

/// Request a single fix, giving up after `options.timeout`.
pub async fn locate(
    provider: &dyn LocationProvider,
    options: &LocationOptions,
) -> Result<Position, LocationError> {
    match tokio::time::timeout(options.timeout, provider.current_position(options)).await {
        Ok(result) => result,
        Err(_) => Err(LocationError::Timeout),
    }
}

/// Always reports the same coordinates (configured or given on the command line).
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation {
    position: Position,
}

impl FixedLocation {
    pub fn new(position: Position) -> Self {
        Self { position }
    }
}

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn current_position(&self, _options: &LocationOptions) -> Result<Position, LocationError> {
        Ok(self.position)
    }
}

/// Host without a position source.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocation;

#[async_trait]
impl LocationProvider for NoLocation {
    async fn current_position(&self, _options: &LocationOptions) -> Result<Position, LocationError> {
        Err(LocationError::Unavailable)
    }
}
