use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::config::Config;
use crate::fetch::{ChartPoint, HistoryFetcher, Interval, KlineSource};

/// What the chart panel is currently showing.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartState {
    NoSelection,
    Loading { pair: String },
    Selected { pair: String, series: Vec<ChartPoint> },
}

impl ChartState {
    pub fn pair(&self) -> Option<&str> {
        match self {
            ChartState::NoSelection => None,
            ChartState::Loading { pair } | ChartState::Selected { pair, .. } => Some(pair.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ChartSettings {
    pub interval: Interval,
    pub lookback_hours: i64,
    pub refresh_every: Duration,
}

impl ChartSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: config.history.interval,
            lookback_hours: config.history.lookback_hours,
            refresh_every: config.dashboard.refresh_every,
        }
    }
}

/// A finished fetch, tagged with the selection ticket it was issued under.
#[derive(Debug)]
pub struct FetchOutcome {
    pub ticket: u64,
    pub pair: String,
    pub series: Vec<ChartPoint>,
    pub background: bool,
}

/// Drives chart selection, initial loads and the periodic refresh timer.
pub struct DashboardController<S> {
    fetcher: Arc<HistoryFetcher<S>>,
    settings: ChartSettings,
    state: ChartState,
    ticket: u64,
    outcomes_tx: mpsc::UnboundedSender<FetchOutcome>,
    outcomes_rx: mpsc::UnboundedReceiver<FetchOutcome>,
    refresh: Option<JoinHandle<()>>,
}

impl<S: KlineSource + 'static> DashboardController<S> {
    pub fn new(fetcher: HistoryFetcher<S>, settings: ChartSettings) -> Self {
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();
        Self {
            fetcher: Arc::new(fetcher),
            settings,
            state: ChartState::NoSelection,
            ticket: 0,
            outcomes_tx,
            outcomes_rx,
            refresh: None,
        }
    }

    pub fn state(&self) -> &ChartState {
        &self.state
    }

    pub fn selected_pair(&self) -> Option<&str> {
        self.state.pair()
    }

    pub fn series(&self) -> Option<&[ChartPoint]> {
        match &self.state {
            ChartState::Selected { series, .. } => Some(series.as_slice()),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, ChartState::Loading { .. })
    }

    pub fn has_refresh_timer(&self) -> bool {
        self.refresh
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Toggle `pair`: the active pair clears the chart, any other pair starts loading it.
    pub fn select(&mut self, pair: &str) {
        let toggling_off = self.selected_pair() == Some(pair);

        self.cancel_refresh();
        self.ticket += 1;

        if toggling_off {
            info!("Chart selection cleared ({})", pair);
            self.state = ChartState::NoSelection;
            return;
        }

        info!("Loading chart for {}", pair);
        self.state = ChartState::Loading {
            pair: pair.to_string(),
        };
        self.spawn_initial_fetch(pair.to_string());
    }

    /// Fold one outcome into the state. Returns whether the display changed.
    pub fn apply(&mut self, outcome: FetchOutcome) -> bool {
        if outcome.ticket != self.ticket {
            debug!(
                "Discarding stale chart data for {} (ticket {} != {})",
                outcome.pair, outcome.ticket, self.ticket
            );
            return false;
        }

        let accepted = match &self.state {
            ChartState::Loading { pair } => !outcome.background && *pair == outcome.pair,
            ChartState::Selected { pair, .. } => *pair == outcome.pair,
            ChartState::NoSelection => false,
        };
        if !accepted {
            debug!("Ignoring chart data for {} in state {:?}", outcome.pair, self.state.pair());
            return false;
        }

        let was_loading = self.is_loading();
        debug!(
            "Chart for {} now has {} points{}",
            outcome.pair,
            outcome.series.len(),
            if outcome.background { " (refresh)" } else { "" }
        );
        self.state = ChartState::Selected {
            pair: outcome.pair.clone(),
            series: outcome.series,
        };
        if was_loading {
            self.start_refresh(outcome.pair);
        }
        true
    }

    /// Apply every outcome that is already waiting.
    pub fn pump(&mut self) -> bool {
        let mut changed = false;
        while let Ok(outcome) = self.outcomes_rx.try_recv() {
            changed |= self.apply(outcome);
        }
        changed
    }

    /// Wait for the next outcome and apply it.
    pub async fn next_outcome(&mut self) -> Option<bool> {
        let outcome = self.outcomes_rx.recv().await?;
        Some(self.apply(outcome))
    }

    pub fn cancel_refresh(&mut self) {
        if let Some(handle) = self.refresh.take() {
            debug!("Cancelling chart refresh timer");
            handle.abort();
        }
    }

    pub fn shutdown(&mut self) {
        self.cancel_refresh();
        self.ticket += 1;
    }

    fn spawn_initial_fetch(&self, pair: String) {
        let fetcher = Arc::clone(&self.fetcher);
        let tx = self.outcomes_tx.clone();
        let ticket = self.ticket;
        let ChartSettings {
            interval,
            lookback_hours,
            ..
        } = self.settings;

        tokio::spawn(async move {
            let series = fetcher.fetch(&pair, interval, lookback_hours).await;
            let _ = tx.send(FetchOutcome {
                ticket,
                pair,
                series,
                background: false,
            });
        });
    }

    fn start_refresh(&mut self, pair: String) {
        self.cancel_refresh();

        let fetcher = Arc::clone(&self.fetcher);
        let tx = self.outcomes_tx.clone();
        let ticket = self.ticket;
        let ChartSettings {
            interval,
            lookback_hours,
            refresh_every,
        } = self.settings;

        debug!("Refreshing {} every {:?}", pair, refresh_every);
        self.refresh = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + refresh_every, refresh_every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                debug!("Background refresh for {}", pair);
                let series = fetcher.fetch(&pair, interval, lookback_hours).await;
                let outcome = FetchOutcome {
                    ticket,
                    pair: pair.clone(),
                    series,
                    background: true,
                };
                if tx.send(outcome).is_err() {
                    break;
                }
            }
        }));
    }
}

impl<S> Drop for DashboardController<S> {
    fn drop(&mut self) {
        if let Some(handle) = self.refresh.take() {
            handle.abort();
        }
    }
}
