use tracing::{debug, warn};

use crate::orders::SwapLeg;

#[derive(Debug, Clone, Copy)]
pub struct WatcherConfig {
    /// Floor applied on top of the leg's own `required_confirmations`.
    pub min_confirmations: u64,
    pub reorg_buffer: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            min_confirmations: 1,
            reorg_buffer: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatcherState {
    last_seen_height: Option<u64>,
    initiate_height: Option<u64>,
}

impl WatcherState {
    pub fn initiate_height(&self) -> Option<u64> {
        self.initiate_height
    }

    pub fn last_seen_height(&self) -> Option<u64> {
        self.last_seen_height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherEvent {
    NotInitiated,
    AwaitingConfirmations {
        observed_height: u64,
        current_height: u64,
        remaining: u64,
    },
    Confirmed {
        observed_height: u64,
        confirmations: u64,
    },
    ReorgDetected {
        previous_height: u64,
        current_height: u64,
    },
}

/// Follows the initiate of one HTLC leg across polls.
#[derive(Debug, Clone)]
pub struct LegWatcher {
    config: WatcherConfig,
    state: WatcherState,
}

impl LegWatcher {
    pub fn new(config: WatcherConfig) -> Self {
        Self {
            config,
            state: WatcherState::default(),
        }
    }

    pub fn observe_initiate(&mut self, height: u64) {
        let should_update = self.state.initiate_height.map_or(true, |current| height < current);
        if should_update {
            debug!(initiate_height = height, "Observed initiate height");
            self.state.initiate_height = Some(height);
        }
    }

    pub fn update_height(&mut self, current_height: u64) -> Option<WatcherEvent> {
        if let Some(previous) = self.state.last_seen_height {
            if current_height + self.config.reorg_buffer < previous {
                warn!(
                    previous_height = previous,
                    current_height,
                    "Reorg detected; clearing observed initiate height"
                );
                self.state.last_seen_height = Some(current_height);
                self.state.initiate_height = None;
                return Some(WatcherEvent::ReorgDetected {
                    previous_height: previous,
                    current_height,
                });
            }
        }

        self.state.last_seen_height = Some(current_height);
        None
    }

    pub fn evaluate(&self, current_height: u64, required: u64) -> WatcherEvent {
        match self.state.initiate_height {
            None => WatcherEvent::NotInitiated,
            Some(observed_height) => {
                let required = required.max(self.config.min_confirmations);
                // The inclusion block counts as the first confirmation.
                let confirmations = current_height.saturating_sub(observed_height) + 1;
                if current_height < observed_height {
                    WatcherEvent::AwaitingConfirmations {
                        observed_height,
                        current_height,
                        remaining: required,
                    }
                } else if confirmations >= required {
                    WatcherEvent::Confirmed {
                        observed_height,
                        confirmations,
                    }
                } else {
                    WatcherEvent::AwaitingConfirmations {
                        observed_height,
                        current_height,
                        remaining: required - confirmations,
                    }
                }
            }
        }
    }

    pub fn state(&self) -> WatcherState {
        self.state
    }

    /// Feeds the orderbook's view of the leg and the chain tip.
    ///
    /// An initiate that vanishes from the leg, or reappears at a height
    /// beyond the reorg buffer, is reported as a reorg.
    pub fn observe_leg(&mut self, leg: &SwapLeg, current_height: u64) -> WatcherEvent {
        if let Some(event) = self.update_height(current_height) {
            return event;
        }

        match (self.state.initiate_height, leg.initiate_block()) {
            (Some(previous), None) => {
                warn!(swap_id = %leg.swap_id, previous_height = previous, "Initiate disappeared from leg");
                self.state.initiate_height = None;
                return WatcherEvent::ReorgDetected {
                    previous_height: previous,
                    current_height,
                };
            }
            (Some(previous), Some(height))
                if height.abs_diff(previous) > self.config.reorg_buffer =>
            {
                warn!(
                    swap_id = %leg.swap_id,
                    previous_height = previous,
                    height,
                    "Initiate moved beyond reorg buffer"
                );
                self.state.initiate_height = None;
                return WatcherEvent::ReorgDetected {
                    previous_height: previous,
                    current_height,
                };
            }
            (_, Some(height)) => self.observe_initiate(height),
            (None, None) => {}
        }

        let event = self.evaluate(current_height, leg.required_confirmations);
        // The orderbook's own confirmation count wins when the local tip lags.
        match event {
            WatcherEvent::AwaitingConfirmations { observed_height, .. }
                if leg.required_confirmations > 0
                    && leg.current_confirmations >= leg.required_confirmations =>
            {
                WatcherEvent::Confirmed {
                    observed_height,
                    confirmations: leg.current_confirmations,
                }
            }
            other => other,
        }
    }
}
