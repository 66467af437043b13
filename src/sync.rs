//! Lock-free primitives shared by the EM passes.

/* std use */
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// An `f64` that can be read and written through a shared reference.
#[derive(Debug, Default)]
pub struct AtomicF64(AtomicU64);

impl AtomicF64 {
    pub fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    pub fn load(&self, order: Ordering) -> f64 {
        f64::from_bits(self.0.load(order))
    }

    pub fn store(&self, value: f64, order: Ordering) {
        self.0.store(value.to_bits(), order)
    }

    /// Direct access when no other thread can observe the value
    pub fn set(&mut self, value: f64) {
        *self.0.get_mut() = value.to_bits();
    }

    pub fn get(&mut self) -> f64 {
        f64::from_bits(*self.0.get_mut())
    }
}

impl Clone for AtomicF64 {
    fn clone(&self) -> Self {
        Self::new(self.load(Ordering::Relaxed))
    }
}

/// Countdown barrier where the last arrival, and only it, runs the completion.
///
/// Each round expects exactly `degree` arrivals. The arrival that completes a
/// round observes every write made by the other arrivals before their
/// [FanIn::arrive] call, and rearms the counter for the next round.
#[derive(Debug)]
pub struct FanIn {
    arrived: AtomicUsize,
    degree: usize,
}

impl FanIn {
    pub fn new(degree: usize) -> Self {
        Self {
            arrived: AtomicUsize::new(0),
            degree,
        }
    }

    /// Number of arrivals that complete a round
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Register one arrival, run `complete` if it is the last of the round.
    ///
    /// Return true if `complete` was run by this call.
    pub fn arrive<F>(&self, complete: F) -> bool
    where
        F: FnOnce(),
    {
        let previous = self.arrived.fetch_add(1, Ordering::AcqRel);
        assert!(
            previous < self.degree,
            "fan-in received {} arrivals for a degree of {}",
            previous + 1,
            self.degree
        );

        if previous + 1 == self.degree {
            complete();
            self.arrived.store(0, Ordering::Release);
            true
        } else {
            false
        }
    }

    /// True if no round is in progress
    pub fn is_idle(&self) -> bool {
        self.arrived.load(Ordering::Acquire) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rayon::prelude::*;

    #[test]
    fn atomic_f64() {
        let mut value = AtomicF64::new(1.5);

        assert_eq!(value.load(Ordering::Relaxed), 1.5);

        value.store(-0.25, Ordering::Relaxed);
        assert_eq!(value.get(), -0.25);

        value.set(f64::INFINITY);
        assert_eq!(value.clone().load(Ordering::Relaxed), f64::INFINITY);
    }

    #[test]
    fn last_arrival_completes() {
        let fan_in = FanIn::new(3);
        let mut completed = 0;

        assert!(!fan_in.arrive(|| completed += 1));
        assert!(!fan_in.arrive(|| completed += 1));
        assert!(!fan_in.is_idle());
        assert!(fan_in.arrive(|| completed += 1));

        assert_eq!(completed, 1);
        assert!(fan_in.is_idle());
    }

    #[test]
    fn reusable_across_rounds() {
        let fan_in = FanIn::new(2);
        let completed = AtomicUsize::new(0);

        for _ in 0..5 {
            fan_in.arrive(|| {
                completed.fetch_add(1, Ordering::Relaxed);
            });
            fan_in.arrive(|| {
                completed.fetch_add(1, Ordering::Relaxed);
            });
        }

        assert_eq!(completed.into_inner(), 5);
    }

    #[test]
    fn completion_observes_all_writes() {
        let degree = 64;
        let values = (0..degree).map(|_| AtomicF64::new(0.0)).collect::<Vec<_>>();
        let fan_in = FanIn::new(degree);
        let total = AtomicF64::new(0.0);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(8)
            .build()
            .unwrap();

        for round in 1..20 {
            pool.install(|| {
                (0..degree).into_par_iter().for_each(|i| {
                    values[i].store((round * i) as f64, Ordering::Relaxed);
                    fan_in.arrive(|| {
                        let sum = values
                            .iter()
                            .map(|v| v.load(Ordering::Relaxed))
                            .sum::<f64>();
                        total.store(sum, Ordering::Relaxed);
                    });
                });
            });

            let expected = (0..degree).map(|i| (round * i) as f64).sum::<f64>();
            assert_eq!(total.load(Ordering::Relaxed), expected);
            assert!(fan_in.is_idle());
        }
    }

    #[test]
    #[should_panic]
    fn too_many_arrivals() {
        let fan_in = FanIn::new(0);

        fan_in.arrive(|| ());
    }
}
