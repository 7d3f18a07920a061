use std::time::Instant;

use crate::consts::{
    DEFAULT_RENDER_RATE, DEFAULT_UPDATE_RATE, MAX_CATCHUP_MS, METRICS_WINDOW, SAMPLE_PERIOD_MS,
};

/// Receiver of scheduler callbacks.
///
/// `update` runs zero or more times per tick (it is a catch-up loop, not a
/// single call) with the running simulation time and the fixed step size.
/// `render` runs at most once per tick with the accumulated simulation time,
/// the offset between the render and update clocks, and that offset
/// normalized by the update step, usable as an interpolation factor for
/// smooth presentation between discrete simulation steps.
pub trait TickHandler {
    fn update(&mut self, t: f64, step: f64);
    fn render(&mut self, t: f64, dt: f64, alpha: f64);
}

/// Per-channel diagnostic readout (update and render measured independently).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChannelMetrics {
    pub update: f64,
    pub render: f64,
}

#[derive(Debug, Clone, Copy)]
struct RollingWindow {
    samples: [f64; METRICS_WINDOW],
}

impl RollingWindow {
    fn filled_with(value: f64) -> Self {
        Self {
            samples: [value; METRICS_WINDOW],
        }
    }

    /// Replaces the sample at `index` and returns the smoothed window mean,
    /// rounded to two decimals.
    fn sample(&mut self, index: usize, value: f64, smoothing: f64) -> f64 {
        self.samples[index % METRICS_WINDOW] = value;
        let mean = self.samples.iter().sum::<f64>() / METRICS_WINDOW as f64;
        (mean * smoothing * 100.0).round() / 100.0
    }
}

/// Fixed-timestep scheduler driving independent simulation and render
/// cadences from a single caller-supplied millisecond clock.
///
/// Two drivers cooperate: [`frame_tick`](Scheduler::frame_tick) is the
/// high-frequency presentation-aligned driver, and
/// [`interval_tick`](Scheduler::interval_tick) is the coarse periodic driver
/// that ticks as a fallback when the presentation driver is stalled and
/// recomputes rolling performance metrics once per sampling period.
/// Neither driver performs IO; all timing flows from the `now_ms` arguments,
/// so the scheduler is fully deterministic under test.
pub struct Scheduler {
    update_rate: f64,
    render_rate: f64,
    update_interval: f64,
    render_interval: f64,
    tick_interval: f64,

    last_sample_time: f64,
    last_frame_time: f64,
    last_tick_time: f64,

    running: bool,
    pause_depth: u32,

    update_frames: u32,
    render_frames: u32,
    elapsed_update: f64,
    elapsed_render: f64,
    update_time: f64,
    render_time: f64,

    current_fps: ChannelMetrics,
    current_usage: ChannelMetrics,
    usage_update: RollingWindow,
    usage_render: RollingWindow,
    fps_update: RollingWindow,
    fps_render: RollingWindow,
    metrics_index: usize,
    smoothing: f64,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        let mut scheduler = Self {
            update_rate: DEFAULT_UPDATE_RATE,
            render_rate: DEFAULT_RENDER_RATE,
            update_interval: 0.0,
            render_interval: 0.0,
            tick_interval: 0.0,
            last_sample_time: 0.0,
            last_frame_time: 0.0,
            last_tick_time: 0.0,
            running: false,
            pause_depth: 0,
            update_frames: 0,
            render_frames: 0,
            elapsed_update: 0.0,
            elapsed_render: 0.0,
            update_time: 0.0,
            render_time: 0.0,
            current_fps: ChannelMetrics::default(),
            current_usage: ChannelMetrics::default(),
            usage_update: RollingWindow::filled_with(0.0),
            usage_render: RollingWindow::filled_with(0.0),
            fps_update: RollingWindow::filled_with(DEFAULT_UPDATE_RATE),
            fps_render: RollingWindow::filled_with(DEFAULT_RENDER_RATE),
            metrics_index: 0,
            smoothing: 1.0,
        };
        scheduler.set_rates(DEFAULT_UPDATE_RATE, DEFAULT_RENDER_RATE);
        scheduler
    }

    /// Reconfigures the two channel rates, in callbacks per second.
    ///
    /// Rates below 1 clamp to 1. The update interval rounds up and the render
    /// interval rounds down; the asymmetry avoids over-ticking the simulation
    /// and under-rendering the presentation. Both intervals have a floor of
    /// 1ms so the catch-up drains always advance.
    pub fn set_rates(&mut self, update_rate: f64, render_rate: f64) {
        self.update_rate = update_rate.max(1.0);
        self.render_rate = render_rate.max(1.0);
        self.update_interval = (1000.0 / self.update_rate).ceil().max(1.0);
        self.render_interval = (1000.0 / self.render_rate).floor().max(1.0);
        self.tick_interval = self.update_interval.max(self.render_interval);
        log::debug!(
            "scheduler rates set u={} r={}",
            self.update_rate,
            self.render_rate
        );
    }

    /// Starts ticking. A no-op while already running.
    pub fn start(&mut self, now_ms: f64) {
        if self.running {
            return;
        }
        self.reset();
        self.running = true;
        self.last_sample_time = now_ms;
        self.last_tick_time = now_ms;
        self.last_frame_time = now_ms;
        log::debug!("scheduler started");
    }

    /// Stops ticking and resets all counters and accumulators. Idempotent.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.reset();
        log::debug!("scheduler stopped");
    }

    /// Increments the pause counter; while it is above zero, update callbacks
    /// are skipped but render callbacks keep firing so presentation stays
    /// live.
    pub fn pause(&mut self) {
        self.pause_depth += 1;
        log::debug!("scheduler paused (depth={})", self.pause_depth);
    }

    /// Decrements the pause counter, with a floor of zero.
    pub fn resume(&mut self) {
        self.pause_depth = self.pause_depth.saturating_sub(1);
        log::debug!("scheduler resuming (depth={})", self.pause_depth);
    }

    /// Presentation-aligned driver; call as often as the host allows, ideally
    /// once per display refresh. Runs the core tick only when at least one
    /// full scheduler interval has elapsed since the last tick.
    pub fn frame_tick(&mut self, now_ms: f64, handler: &mut dyn TickHandler) {
        if !self.running {
            return;
        }
        self.last_frame_time = now_ms;
        if now_ms - self.last_tick_time >= self.update_interval.min(self.render_interval) {
            self.tick(now_ms, handler);
        }
    }

    /// Coarse periodic driver; call from the host's main loop at any rate.
    /// Internally gated to the sampling period: when due, it ticks if the
    /// presentation driver looks stalled, then recomputes rolling metrics.
    pub fn interval_tick(&mut self, now_ms: f64, handler: &mut dyn TickHandler) {
        if !self.running {
            return;
        }
        if now_ms - self.last_sample_time < SAMPLE_PERIOD_MS {
            return;
        }
        if now_ms - self.last_frame_time > self.tick_interval {
            self.tick(now_ms, handler);
        }
        self.smoothing =
            (SAMPLE_PERIOD_MS / (now_ms - self.last_sample_time).max(0.1)).min(1.0);
        // Frame counts are per sampling period; scale them to per-second.
        let scale = 1000.0 / SAMPLE_PERIOD_MS;
        self.current_fps.update = self.fps_update.sample(
            self.metrics_index,
            self.update_frames as f64 * scale,
            self.smoothing,
        );
        self.current_fps.render = self.fps_render.sample(
            self.metrics_index,
            self.render_frames as f64 * scale,
            self.smoothing,
        );
        self.update_frames = 0;
        self.render_frames = 0;
        self.last_sample_time = now_ms;
    }

    fn tick(&mut self, now_ms: f64, handler: &mut dyn TickHandler) {
        let delta = now_ms - self.last_tick_time;
        self.last_tick_time = now_ms;

        if self.pause_depth == 0 {
            let capped = delta.min(MAX_CATCHUP_MS);
            self.elapsed_update += capped;
            self.elapsed_render += capped;
        }

        let update_start = Instant::now();
        while self.update_time < self.elapsed_update {
            handler.update(self.update_time, self.update_interval);
            self.update_time += self.update_interval;
            self.update_frames += 1;
        }
        let update_spent = update_start.elapsed().as_secs_f64() * 1000.0;

        let render_start = Instant::now();
        let old_render_time = self.render_time;
        while self.render_time < self.elapsed_render {
            self.render_time += self.render_interval;
        }
        // Render when a render step came due, and always while paused so the
        // presentation does not freeze with the simulation.
        if self.render_time > old_render_time || self.pause_depth != 0 {
            let dt = self.render_time - self.update_time;
            handler.render(self.elapsed_update, dt, dt / self.update_interval);
            self.render_frames += 1;
        }
        let render_spent = render_start.elapsed().as_secs_f64() * 1000.0;

        self.current_usage.update = self.usage_update.sample(
            self.metrics_index,
            update_spent / self.update_interval,
            self.smoothing,
        );
        self.current_usage.render = self.usage_render.sample(
            self.metrics_index,
            render_spent / self.render_interval,
            self.smoothing,
        );
        self.metrics_index = (self.metrics_index + 1) % METRICS_WINDOW;
    }

    fn reset(&mut self) {
        self.last_sample_time = 0.0;
        self.last_frame_time = 0.0;
        self.last_tick_time = 0.0;
        self.pause_depth = 0;
        self.update_frames = 0;
        self.render_frames = 0;
        self.elapsed_update = 0.0;
        self.elapsed_render = 0.0;
        self.update_time = 0.0;
        self.render_time = 0.0;
        self.current_fps = ChannelMetrics::default();
        self.current_usage = ChannelMetrics::default();
        self.usage_update = RollingWindow::filled_with(0.0);
        self.usage_render = RollingWindow::filled_with(0.0);
        self.fps_update = RollingWindow::filled_with(self.update_rate);
        self.fps_render = RollingWindow::filled_with(self.render_rate);
        self.metrics_index = 0;
        self.smoothing = 1.0;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_paused(&self) -> bool {
        self.pause_depth > 0
    }

    /// Observed callbacks per second, smoothed over the rolling window.
    pub fn fps(&self) -> ChannelMetrics {
        self.current_fps
    }

    /// Ratio of wall time spent in each callback phase to its interval
    /// budget, smoothed over the rolling window. Purely diagnostic.
    pub fn usage(&self) -> ChannelMetrics {
        self.current_usage
    }

    /// Accumulated simulation time in milliseconds. `smooth` selects the
    /// wall-accumulated value; otherwise the value quantized to completed
    /// update steps.
    pub fn time(&self, smooth: bool) -> f64 {
        if smooth {
            self.elapsed_update
        } else {
            self.update_time
        }
    }

    pub fn update_interval(&self) -> f64 {
        self.update_interval
    }

    pub fn render_interval(&self) -> f64 {
        self.render_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        updates: Vec<(f64, f64)>,
        renders: Vec<(f64, f64, f64)>,
    }

    impl TickHandler for Recorder {
        fn update(&mut self, t: f64, step: f64) {
            self.updates.push((t, step));
        }
        fn render(&mut self, t: f64, dt: f64, alpha: f64) {
            self.renders.push((t, dt, alpha));
        }
    }

    fn drive_frames(scheduler: &mut Scheduler, handler: &mut Recorder, from_ms: u32, to_ms: u32) {
        for ms in from_ms..=to_ms {
            scheduler.frame_tick(ms as f64, handler);
        }
    }

    #[test]
    fn intervals_round_asymmetrically() {
        let mut scheduler = Scheduler::new();
        scheduler.set_rates(60.0, 30.0);
        assert_eq!(scheduler.update_interval(), 17.0);
        assert_eq!(scheduler.render_interval(), 33.0);
    }

    #[test]
    fn rates_clamp_to_one() {
        let mut scheduler = Scheduler::new();
        scheduler.set_rates(0.0, -10.0);
        assert_eq!(scheduler.update_interval(), 1000.0);
        assert_eq!(scheduler.render_interval(), 1000.0);
    }

    #[test]
    fn intervals_have_a_floor_of_one_ms() {
        let mut scheduler = Scheduler::new();
        scheduler.set_rates(30.0, 1001.0);
        assert_eq!(scheduler.render_interval(), 1.0);
        scheduler.set_rates(100_000.0, 100_000.0);
        assert_eq!(scheduler.update_interval(), 1.0);
        assert_eq!(scheduler.render_interval(), 1.0);
    }

    #[test]
    fn ticks_terminate_at_extreme_render_rates() {
        let mut scheduler = Scheduler::new();
        let mut handler = Recorder::default();
        scheduler.set_rates(30.0, 5000.0);
        scheduler.start(0.0);

        // The render drain advances in 1ms steps and finishes.
        scheduler.frame_tick(100.0, &mut handler);
        assert_eq!(handler.renders.len(), 1);
        assert_eq!(handler.updates.len(), 3);
    }

    #[test]
    fn callback_counts_track_configured_rates() {
        let mut scheduler = Scheduler::new();
        let mut handler = Recorder::default();
        scheduler.set_rates(60.0, 30.0);
        scheduler.start(0.0);

        drive_frames(&mut scheduler, &mut handler, 1, 1000);

        let updates = handler.updates.len();
        let renders = handler.renders.len();
        assert!((57..=63).contains(&updates), "updates = {updates}");
        assert!((27..=33).contains(&renders), "renders = {renders}");
    }

    #[test]
    fn exact_counts_at_low_rates() {
        let mut scheduler = Scheduler::new();
        let mut handler = Recorder::default();
        scheduler.set_rates(10.0, 5.0);
        scheduler.start(0.0);

        drive_frames(&mut scheduler, &mut handler, 1, 2000);

        assert_eq!(handler.updates.len(), 20);
        assert_eq!(handler.renders.len(), 10);
    }

    #[test]
    fn update_passes_running_time_and_step() {
        let mut scheduler = Scheduler::new();
        let mut handler = Recorder::default();
        scheduler.set_rates(10.0, 10.0);
        scheduler.start(0.0);

        drive_frames(&mut scheduler, &mut handler, 1, 350);

        assert_eq!(handler.updates[0], (0.0, 100.0));
        assert_eq!(handler.updates[1], (100.0, 100.0));
        assert_eq!(handler.updates[2], (200.0, 100.0));
    }

    #[test]
    fn pause_skips_updates_but_not_renders() {
        let mut scheduler = Scheduler::new();
        let mut handler = Recorder::default();
        scheduler.set_rates(60.0, 30.0);
        scheduler.start(0.0);
        scheduler.pause();

        drive_frames(&mut scheduler, &mut handler, 1, 1000);

        assert_eq!(handler.updates.len(), 0);
        assert!(!handler.renders.is_empty());
        assert!(scheduler.is_paused());
    }

    #[test]
    fn resume_continues_without_resetting_time() {
        let mut scheduler = Scheduler::new();
        let mut handler = Recorder::default();
        scheduler.set_rates(10.0, 10.0);
        scheduler.start(0.0);

        drive_frames(&mut scheduler, &mut handler, 1, 500);
        let time_before_pause = scheduler.time(true);
        scheduler.pause();
        drive_frames(&mut scheduler, &mut handler, 501, 1000);
        assert_eq!(scheduler.time(true), time_before_pause);

        scheduler.resume();
        let updates_before = handler.updates.len();
        drive_frames(&mut scheduler, &mut handler, 1001, 1500);
        assert!(handler.updates.len() > updates_before);
        // Simulation time carries on from where the pause froze it.
        assert!(scheduler.time(true) > time_before_pause);
    }

    #[test]
    fn resume_has_a_floor_of_zero() {
        let mut scheduler = Scheduler::new();
        scheduler.resume();
        scheduler.resume();
        assert!(!scheduler.is_paused());
        scheduler.pause();
        assert!(scheduler.is_paused());
        scheduler.resume();
        assert!(!scheduler.is_paused());
    }

    #[test]
    fn start_is_idempotent_while_running() {
        let mut scheduler = Scheduler::new();
        let mut handler = Recorder::default();
        scheduler.set_rates(10.0, 10.0);
        scheduler.start(0.0);
        drive_frames(&mut scheduler, &mut handler, 1, 500);
        let accumulated = scheduler.time(true);

        scheduler.start(250.0);
        assert_eq!(scheduler.time(true), accumulated);
    }

    #[test]
    fn stop_resets_and_is_idempotent() {
        let mut scheduler = Scheduler::new();
        let mut handler = Recorder::default();
        scheduler.set_rates(10.0, 10.0);
        scheduler.start(0.0);
        drive_frames(&mut scheduler, &mut handler, 1, 500);

        scheduler.stop();
        assert!(!scheduler.is_running());
        assert_eq!(scheduler.time(true), 0.0);

        scheduler.stop();
        assert!(!scheduler.is_running());

        let before = handler.updates.len();
        drive_frames(&mut scheduler, &mut handler, 501, 1000);
        assert_eq!(handler.updates.len(), before);
    }

    #[test]
    fn catchup_is_capped_after_a_stall() {
        let mut scheduler = Scheduler::new();
        let mut handler = Recorder::default();
        scheduler.set_rates(10.0, 10.0);
        scheduler.start(0.0);

        // One enormous gap: only MAX_CATCHUP_MS worth of steps replay.
        scheduler.frame_tick(60_000.0, &mut handler);
        assert_eq!(handler.updates.len(), (MAX_CATCHUP_MS / 100.0) as usize);
    }

    #[test]
    fn interval_tick_is_a_fallback_when_frames_stall() {
        let mut scheduler = Scheduler::new();
        let mut handler = Recorder::default();
        scheduler.set_rates(60.0, 30.0);
        scheduler.start(0.0);

        // No frame_tick calls at all; the coarse driver keeps the sim moving.
        scheduler.interval_tick(200.0, &mut handler);
        assert!(!handler.updates.is_empty());

        // Called again before the sampling period has elapsed: gated off.
        let count = handler.updates.len();
        scheduler.interval_tick(250.0, &mut handler);
        assert_eq!(handler.updates.len(), count);
    }

    #[test]
    fn interval_tick_does_not_tick_while_frames_are_live() {
        let mut scheduler = Scheduler::new();
        let mut handler = Recorder::default();
        scheduler.set_rates(60.0, 30.0);
        scheduler.start(0.0);

        drive_frames(&mut scheduler, &mut handler, 1, 200);
        let count = handler.updates.len();
        scheduler.interval_tick(200.0, &mut handler);
        assert_eq!(handler.updates.len(), count);
    }

    #[test]
    fn fps_metrics_scale_period_counts_to_per_second() {
        let mut scheduler = Scheduler::new();
        let mut handler = Recorder::default();
        scheduler.set_rates(20.0, 10.0);
        scheduler.start(0.0);

        // Exactly one full sampling period of steady frames: 4 updates and
        // 2 renders in 200ms scale back up to the configured rates.
        for ms in 1..=200 {
            scheduler.frame_tick(ms as f64, &mut handler);
            scheduler.interval_tick(ms as f64, &mut handler);
        }
        assert_eq!(scheduler.fps().update, 20.0);
        assert_eq!(scheduler.fps().render, 10.0);
    }

    #[test]
    fn metrics_read_back_after_sampling() {
        let mut scheduler = Scheduler::new();
        let mut handler = Recorder::default();
        scheduler.set_rates(20.0, 10.0);
        scheduler.start(0.0);

        for ms in 1..=500 {
            scheduler.frame_tick(ms as f64, &mut handler);
            scheduler.interval_tick(ms as f64, &mut handler);
        }

        assert!(scheduler.fps().update >= 0.0);
        assert!(scheduler.usage().render >= 0.0);
        assert!(scheduler.time(true) > 0.0);
        assert!(scheduler.time(false) >= 0.0);
    }
}
