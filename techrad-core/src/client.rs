//! Issues the current-conditions and forecast requests and writes their results into the cache.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{
    cache::WeatherCache,
    provider::{Lookup, Query, WeatherProvider},
};

#[derive(Debug)]
struct ClientState {
    provider: Arc<dyn WeatherProvider>,
    cache: WeatherCache,
    generation: AtomicU64,
}

impl ClientState {
    fn is_latest(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }
}

#[derive(Debug, Clone)]
pub struct WeatherClient {
    state: Arc<ClientState>,
}

/// The two in-flight requests of one fetch. Dropping the handle does not cancel them.
#[derive(Debug)]
pub struct FetchHandle {
    generation: u64,
    current: JoinHandle<()>,
    forecast: JoinHandle<()>,
}

impl FetchHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_finished(&self) -> bool {
        self.current.is_finished() && self.forecast.is_finished()
    }

    /// Wait until both responses have been handled.
    pub async fn join(self) {
        if let Err(e) = self.current.await {
            warn!(error = %e, "Current conditions task failed");
        }
        if let Err(e) = self.forecast.await {
            warn!(error = %e, "Forecast task failed");
        }
    }
}

impl WeatherClient {
    pub fn new(provider: Arc<dyn WeatherProvider>, cache: WeatherCache) -> Self {
        Self {
            state: Arc::new(ClientState {
                provider,
                cache,
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn latest_generation(&self) -> u64 {
        self.state.generation.load(Ordering::SeqCst)
    }

    /// Start both requests for `query` and return immediately.
    ///
    /// Coordinates are recorded as the last known location whatever the outcome. Responses
    /// belonging to an older call than the latest are discarded. `on_forecast` runs once the
    /// forecast response (found or not found) has been written.
    pub fn fetch_weather<F>(&self, query: Query, on_forecast: F) -> FetchHandle
    where
        F: FnOnce() + Send + 'static,
    {
        if let Query::Coordinates(position) = &query {
            if let Err(e) = self.state.cache.record_location(*position) {
                warn!(error = %e, "Failed to record last known location");
            }
        }

        let generation = self.state.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(generation, %query, "Fetching weather");

        let current = tokio::spawn({
            let state = Arc::clone(&self.state);
            let query = query.clone();
            async move {
                let outcome = state.provider.current(&query).await;
                if !state.is_latest(generation) {
                    debug!(generation, "Dropping stale current conditions response");
                    return;
                }

                let written = match outcome {
                    Ok(Lookup::Found(current)) => state.cache.write_current(&current),
                    Ok(Lookup::NotFound) => {
                        debug!(%query, "No current conditions for query");
                        state.cache.write_current_not_found()
                    }
                    Err(e) => {
                        debug!(error = %e, "Current conditions request dropped");
                        return;
                    }
                };
                if let Err(e) = written {
                    warn!(error = %e, "Failed to cache current conditions");
                }
            }
        });

        let forecast = tokio::spawn({
            let state = Arc::clone(&self.state);
            async move {
                let outcome = state.provider.forecast(&query).await;
                if !state.is_latest(generation) {
                    debug!(generation, "Dropping stale forecast response");
                    return;
                }

                let written = match outcome {
                    Ok(Lookup::Found(forecast)) => state.cache.write_forecast(&forecast),
                    Ok(Lookup::NotFound) => {
                        debug!(%query, "No forecast for query");
                        state.cache.write_forecast_not_found()
                    }
                    Err(e) => {
                        debug!(error = %e, "Forecast request dropped");
                        return;
                    }
                };
                if let Err(e) = written {
                    warn!(error = %e, "Failed to cache forecast");
                }
                on_forecast();
            }
        });

        FetchHandle {
            generation,
            current,
            forecast,
        }
    }
}
