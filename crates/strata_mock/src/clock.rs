use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use strata_http::Clock;

#[derive(Debug, Default)]
struct ClockState {
    start: u64,
    elapsed: Duration,
    sleeps: Vec<Duration>,
}

/// Clock that never blocks: sleeping just advances the epoch.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    state: Arc<Mutex<ClockState>>,
}

impl ManualClock {
    pub fn starting_at(epoch: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(ClockState {
                start: epoch,
                ..Default::default()
            })),
        }
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.lock().sleeps.clone()
    }

    pub fn total_slept(&self) -> Duration {
        self.lock().sleeps.iter().sum()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ClockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for ManualClock {
    fn now_epoch(&self) -> u64 {
        let state = self.lock();
        state.start + state.elapsed.as_secs()
    }

    async fn sleep(&self, duration: Duration) {
        let mut state = self.lock();
        state.elapsed += duration;
        state.sleeps.push(duration);
    }
}
