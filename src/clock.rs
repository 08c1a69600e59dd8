// Rational-ratio clock domain crossing between the host clock and the DRAM
// clock. The host calls tick() once per host cycle and runs the returned
// number of DRAM cycles, which keeps the long-run ratio of the two clocks at
// exactly clock1:clock2 without accumulating floating point error.

#[derive(Debug, Clone)]
pub struct ClockDomainCrosser {
    pub clock1: u64,
    pub clock2: u64,
    counter1: u64,
    counter2: u64,
}

impl Default for ClockDomainCrosser {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl ClockDomainCrosser {
    pub fn new(clock1: u64, clock2: u64) -> Self {
        assert!(clock1 > 0 && clock2 > 0, "clock frequencies must be nonzero");
        Self {
            clock1,
            clock2,
            counter1: 0,
            counter2: 0,
        }
    }

    pub fn from_ratio(ratio: f64) -> Self {
        let (n, d) = approximate_ratio(ratio);
        Self::new(n.max(1), d.max(1))
    }

    pub fn set_clocks(&mut self, clock1: u64, clock2: u64) {
        assert!(clock1 > 0 && clock2 > 0, "clock frequencies must be nonzero");
        self.clock1 = clock1;
        self.clock2 = clock2;
        self.counter1 = 0;
        self.counter2 = 0;
    }

    // Advance one cycle of clock2 (the host side) and return how many cycles
    // of clock1 (the DRAM side) that releases.
    pub fn tick(&mut self) -> u64 {
        // short circuit for 1:1 ratios
        if self.clock1 == self.clock2 {
            return 1;
        }

        let mut released = 0;
        self.counter1 += self.clock1;
        while self.counter2 < self.counter1 {
            self.counter2 += self.clock2;
            released += 1;
        }
        if self.counter1 == self.counter2 {
            self.counter1 = 0;
            self.counter2 = 0;
        }
        released
    }
}

// Continued-fraction approximation of a clock ratio as N/D, capped at 15
// iterations with early exit once the approximation is within 5e-5.
fn approximate_ratio(ratio: f64) -> (u64, u64) {
    const MAX_ITER: usize = 15;
    let x = ratio;
    assert!(x > 0.0, "clock ratio must be positive");

    let mut ns = [0.0f64; MAX_ITER];
    let mut ds = [0.0f64; MAX_ITER];
    let mut zs = [0.0f64; MAX_ITER];
    ds[1] = 1.0;
    zs[1] = x;
    ns[1] = x.trunc();

    let mut i = 1;
    while i < MAX_ITER - 1 {
        if (x - ns[i] / ds[i]).abs() < 5e-5 {
            break;
        }
        zs[i + 1] = 1.0 / (zs[i] - zs[i].floor());
        ds[i + 1] = ds[i] * zs[i + 1].floor() + ds[i - 1];
        let tmp = x * ds[i + 1];
        ns[i + 1] = if tmp.fract() >= 0.5 { tmp.ceil() } else { tmp.floor() };
        i += 1;
    }

    (ns[i] as u64, ds[i] as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_to_one_short_circuits() {
        let mut crosser = ClockDomainCrosser::default();
        for _ in 0..10 {
            assert_eq!(crosser.tick(), 1);
        }
    }

    #[test]
    fn half_rate_fires_every_other_tick() {
        // DRAM at half the host clock
        let mut crosser = ClockDomainCrosser::new(1, 2);
        let released: Vec<u64> = (0..6).map(|_| crosser.tick()).collect();
        assert_eq!(released, vec![1, 0, 1, 0, 1, 0]);
    }

    #[test]
    fn ratio_approximation() {
        assert_eq!(approximate_ratio(0.5), (1, 2));
        assert_eq!(approximate_ratio(0.3333), (1, 3));
        assert_eq!(approximate_ratio(2.0), (2, 1));
        assert_eq!(approximate_ratio(0.9), (9, 10));
    }

    #[test]
    fn long_run_rate_matches_ratio() {
        let mut crosser = ClockDomainCrosser::new(2, 3);
        let total: u64 = (0..3000).map(|_| crosser.tick()).sum();
        assert_eq!(total, 2000);
    }
}
