use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::{
    sync::{watch, Notify},
    task::JoinHandle,
    time::MissedTickBehavior,
};

enum LabelState {
    Detached,
    Attached(JoinHandle<()>),
}

/// A "time since" label that refreshes itself while attached.
///
/// Each label owns its own tick task: attaching starts it, detaching (or
/// dropping the label) aborts it. Re-attaching recomputes immediately from
/// the current time instead of replaying missed ticks.
pub struct LiveTimeLabel {
    since: DateTime<Utc>,
    tick: Duration,
    text_tx: Arc<watch::Sender<String>>,
    redraw: Option<Arc<Notify>>,
    state: LabelState,
}

impl LiveTimeLabel {
    pub fn new(since: DateTime<Utc>, tick: Duration) -> Self {
        let (text_tx, _) = watch::channel(format_elapsed(Utc::now() - since));

        LiveTimeLabel {
            since,
            tick,
            text_tx: Arc::new(text_tx),
            redraw: None,
            state: LabelState::Detached,
        }
    }

    /// Notify `redraw` every time the label text is recomputed.
    pub fn with_redraw(mut self, redraw: Arc<Notify>) -> Self {
        self.redraw = Some(redraw);
        self
    }

    pub fn attach(&mut self) {
        if self.is_attached() {
            return;
        }

        let since = self.since;
        let text_tx = self.text_tx.clone();
        let redraw = self.redraw.clone();
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let handle = tokio::spawn(async move {
            loop {
                // The first tick completes immediately
                interval.tick().await;

                text_tx.send_replace(format_elapsed(Utc::now() - since));

                if let Some(redraw) = &redraw {
                    redraw.notify_one();
                }
            }
        });

        self.state = LabelState::Attached(handle);
    }

    pub fn detach(&mut self) {
        if let LabelState::Attached(handle) = std::mem::replace(&mut self.state, LabelState::Detached) {
            handle.abort();
        }
    }

    pub fn is_attached(&self) -> bool {
        matches!(self.state, LabelState::Attached(_))
    }

    pub fn text(&self) -> String {
        self.text_tx.borrow().clone()
    }
}

impl Drop for LiveTimeLabel {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Humanizes an elapsed duration, keeping only its most significant unit.
pub fn format_elapsed(elapsed: chrono::Duration) -> String {
    let secs = elapsed.num_seconds();

    if secs < 1 {
        return "just now".to_string();
    }

    let secs = secs as u64;
    let unit = [86_400, 3_600, 60, 1]
        .into_iter()
        .find(|unit| secs >= *unit)
        .unwrap_or(1);

    let truncated = Duration::from_secs(secs - secs % unit);

    format!("{} ago", humantime::format_duration(truncated))
}
