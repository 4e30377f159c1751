use std::time::Instant;

/// Per-frame wall-clock delta source for the render loop.
///
/// The baseline is taken on the first tick, so the first frame always sees a
/// zero delta even when startup took measurable time.
pub struct FrameClock {
    last: Option<Instant>,
    elapsed: f32,
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            last: None,
            elapsed: 0.0,
        }
    }

    /// Advance to "now" and return the delta in seconds since the last tick.
    pub fn tick(&mut self) -> f32 {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> f32 {
        let dt = match self.last.replace(now) {
            Some(prev) => now.saturating_duration_since(prev).as_secs_f32(),
            None => 0.0,
        };
        self.elapsed += dt;
        dt
    }

    /// Seconds accumulated since the first tick.
    #[allow(dead_code)]
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn first_tick_is_zero() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.tick(), 0.0);
    }

    #[test]
    fn deltas_accumulate() {
        let mut clock = FrameClock::new();
        let t0 = Instant::now();
        assert_eq!(clock.tick_at(t0), 0.0);
        let dt = clock.tick_at(t0 + Duration::from_millis(16));
        assert!((dt - 0.016).abs() < 1e-4);
        let dt = clock.tick_at(t0 + Duration::from_millis(48));
        assert!((dt - 0.032).abs() < 1e-4);
        assert!((clock.elapsed() - 0.048).abs() < 1e-4);
    }

    #[test]
    fn clock_going_backwards_yields_zero() {
        let mut clock = FrameClock::new();
        let t0 = Instant::now();
        clock.tick_at(t0 + Duration::from_millis(100));
        assert_eq!(clock.tick_at(t0), 0.0);
    }
}
