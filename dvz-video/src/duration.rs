// Per-frame 90kHz duration accumulator (§4.J.2).
//
// `next_duration()` returns `90000/fps` distributed across frames via a
// fractional accumulator, so the average duration equals `90000/fps`
// exactly over time (§8 invariant 4: `|sum(duration) - N*90000/fps| < fps`).
//
// Austin Shafer - 2020

const TIMESCALE: u64 = 90_000;

#[derive(Debug, Clone, Copy)]
pub struct DurationAccumulator {
    fps: u32,
    accum: u64,
}

impl DurationAccumulator {
    pub fn new(fps: u32) -> Self {
        assert!(fps > 0, "fps must be > 0");
        Self { fps, accum: 0 }
    }

    /// Advance the accumulator by one frame and return that frame's
    /// duration in 90kHz ticks.
    pub fn next_duration(&mut self) -> u64 {
        self.accum += TIMESCALE;
        let duration = self.accum / self.fps as u64;
        self.accum -= duration * self.fps as u64;
        duration
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_4_sixty_fps_sums_to_ninety_thousand() {
        let mut acc = DurationAccumulator::new(60);
        let sum: u64 = (0..60).map(|_| acc.next_duration()).sum();
        assert_eq!(sum, 90_000);
    }

    #[test]
    fn scenario_4_fifty_nine_fps_sums_to_ninety_thousand() {
        let mut acc = DurationAccumulator::new(59);
        let sum: u64 = (0..59).map(|_| acc.next_duration()).sum();
        assert_eq!(sum, 90_000);
    }

    #[test]
    fn invariant_4_bounded_drift_over_n_frames_for_various_fps() {
        for fps in [24u32, 25, 30, 48, 50, 60, 90, 120, 144] {
            let mut acc = DurationAccumulator::new(fps);
            let n = 997u64;
            let sum: u64 = (0..n).map(|_| acc.next_duration()).sum();
            let expected = (n * TIMESCALE) as f64 / fps as f64;
            let diff = (sum as f64 - expected).abs();
            assert!(diff < fps as f64, "fps={} diff={} bound={}", fps, diff, fps);
        }
    }
}
