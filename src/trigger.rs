//! Rising-edge trigger search with holdoff, for oscilloscope-style display (§4.11).

/// Scans `time[i]` for `i >= 1` within `[t_start, t_end]` and returns the
/// first index where `channel[i-1] < threshold <= channel[i]`, along with
/// its time. Returns `None` if no such crossing exists in the window.
pub fn find_trigger(
    channel: &[f32],
    time: &[f32],
    threshold: f64,
    t_start: f64,
    t_end: f64,
) -> Option<(usize, f64)> {
    let n = channel.len().min(time.len());
    for i in 1..n {
        let t = time[i] as f64;
        if t < t_start || t > t_end {
            continue;
        }
        let prev = channel[i - 1] as f64;
        let cur = channel[i] as f64;
        if prev < threshold && threshold <= cur {
            return Some((i, t));
        }
    }
    None
}

/// Stateful trigger search with the holdoff policy from §4.11: after a
/// successful trigger at `t*`, new searches are suppressed until
/// `t_latest >= t* + display_window`, where `display_window` is "5
/// divisions" of the configured time scale. A backward jump in the
/// timeline (buffer reset) clears the holdoff immediately.
pub struct TriggerDetector {
    display_window: f64,
    last_trigger_time: Option<f64>,
    last_seen_latest: Option<f64>,
}

impl TriggerDetector {
    pub fn new(time_scale_ms: f64) -> Self {
        Self {
            display_window: Self::display_window_for(time_scale_ms),
            last_trigger_time: None,
            last_seen_latest: None,
        }
    }

    fn display_window_for(time_scale_ms: f64) -> f64 {
        (time_scale_ms * 5.0) / 1000.0
    }

    pub fn set_time_scale(&mut self, time_scale_ms: f64) {
        self.display_window = Self::display_window_for(time_scale_ms);
    }

    pub fn display_window(&self) -> f64 {
        self.display_window
    }

    pub fn reset(&mut self) {
        self.last_trigger_time = None;
        self.last_seen_latest = None;
    }

    /// Runs one search, applying holdoff and the sub-window collapse rule.
    pub fn search(&mut self, channel: &[f32], time: &[f32], threshold: f64) -> Option<(usize, f64)> {
        if time.len() < 2 {
            return None;
        }
        let t_earliest = time[0] as f64;
        let t_latest = *time.last().unwrap() as f64;

        if let Some(prev_latest) = self.last_seen_latest {
            if t_latest < prev_latest {
                self.last_trigger_time = None;
            }
        }
        self.last_seen_latest = Some(t_latest);

        if let Some(t_star) = self.last_trigger_time {
            if t_star >= t_earliest && t_latest < t_star + self.display_window {
                return None;
            }
        }

        let buffer_duration = t_latest - t_earliest;
        let (t_start, t_end) = if buffer_duration < self.display_window {
            (t_earliest, t_earliest + 0.1 * buffer_duration)
        } else {
            (t_earliest, t_latest)
        };

        let found = find_trigger(channel, time, threshold, t_start, t_end);
        if let Some((_, t)) = found {
            self.last_trigger_time = Some(t);
        }
        found
    }
}
