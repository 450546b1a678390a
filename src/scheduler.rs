//! Fixed-timestep update/render driver (§6). Grounded on the teacher's
//! `plugin.rs` (which schedules chunk-loading/meshing systems into Bevy's
//! update stages) generalized into a standalone loop: the embedding
//! application owns the real event loop and calls [`Scheduler::advance`]
//! once per frame with the elapsed wall-clock time.

use tracing::error;

/// One fixed-size simulation step. Boxed so a panicking step can be
/// swapped out without the scheduler itself needing to be generic over
/// the closure type.
type Step = Box<dyn FnMut(f32) + Send>;

/// Drives fixed-timestep updates with bounded catch-up: if a frame took
/// too long, at most `update_limit` steps run before the scheduler gives
/// up on catching the simulation up to wall-clock time, rather than
/// spiraling into a death loop (§6 "Update limit").
pub struct Scheduler {
    accumulator: f32,
    tick: f32,
    update_limit: u32,
    steps: Vec<Option<Step>>,
}

impl Scheduler {
    pub fn new(tick_hz: f32, update_limit: u32) -> Self {
        Self {
            accumulator: 0.0,
            tick: 1.0 / tick_hz,
            update_limit,
            steps: Vec::new(),
        }
    }

    /// Registers a step, returning a handle usable to identify it in logs.
    /// Steps run in registration order every tick.
    pub fn add_step(&mut self, step: impl FnMut(f32) + Send + 'static) -> usize {
        self.steps.push(Some(Box::new(step)));
        self.steps.len() - 1
    }

    /// Advances the simulation by `dt` wall-clock seconds, running as many
    /// fixed ticks as needed (capped at `update_limit`). A step that
    /// panics is caught, logged, and permanently replaced with a no-op —
    /// one misbehaving system does not take the whole scheduler down
    /// (§6 "Failure isolation").
    pub fn advance(&mut self, dt: f32) {
        self.accumulator += dt;
        let mut ran = 0;
        while self.accumulator >= self.tick && ran < self.update_limit {
            self.run_tick();
            self.accumulator -= self.tick;
            ran += 1;
        }
        if ran == self.update_limit {
            self.accumulator = 0.0; // drop the backlog rather than spiral
        }
    }

    fn run_tick(&mut self) {
        let tick = self.tick;
        for (index, slot) in self.steps.iter_mut().enumerate() {
            let Some(mut step) = slot.take() else { continue };
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| step(tick)));
            match result {
                Ok(()) => *slot = Some(step),
                Err(_) => {
                    error!(step = index, "scheduler step panicked; disabling it");
                    *slot = None;
                }
            }
        }
    }

    pub fn pending_steps(&self) -> usize {
        self.steps.iter().filter(|s| s.is_some()).count()
    }
}
