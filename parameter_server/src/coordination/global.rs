use std::collections::BTreeSet;

use parking_lot::Mutex;

use crate::error::{MasterErr, Result};

/// The state shared by every worker session of a run.
///
/// Each piece of state has its own lock, taken only for the duration of a read-modify-write
/// and never across a network operation.
#[derive(Debug)]
pub struct GlobalParams {
    values: Mutex<Vec<f32>>,
    iterations: Mutex<usize>,
    active: Mutex<BTreeSet<usize>>,
    released: Mutex<BTreeSet<usize>>,
}

impl GlobalParams {
    /// Creates a new `GlobalParams`.
    ///
    /// # Arguments
    /// * `init` - The initial global parameter vector.
    pub fn new(init: Vec<f32>) -> Self {
        Self {
            values: Mutex::new(init),
            iterations: Mutex::new(0),
            active: Mutex::new(BTreeSet::new()),
            released: Mutex::new(BTreeSet::new()),
        }
    }

    /// Copies the current global parameter vector.
    pub fn snapshot(&self) -> Vec<f32> {
        self.values.lock().clone()
    }

    /// The global iteration counter.
    pub fn iterations(&self) -> usize {
        *self.iterations.lock()
    }

    /// Adds `worker_id` to the active sessions.
    pub fn connect(&self, worker_id: usize) {
        self.active.lock().insert(worker_id);
    }

    /// Removes `worker_id` from the active sessions without releasing it.
    pub fn disconnect(&self, worker_id: usize) {
        self.active.lock().remove(&worker_id);
    }

    /// Marks `worker_id` as released and removes it from the active sessions.
    pub fn release(&self, worker_id: usize) {
        self.released.lock().insert(worker_id);
        self.disconnect(worker_id);
    }

    /// The amount of active sessions.
    pub fn active(&self) -> usize {
        self.active.lock().len()
    }

    /// Whether `worker_id` completed the release handshake.
    pub fn is_released(&self, worker_id: usize) -> bool {
        self.released.lock().contains(&worker_id)
    }

    /// Folds a worker's parameters into the global vector.
    ///
    /// Every global value moves towards the worker's by `1 / active` of the difference,
    /// so with a single active worker the global vector is overwritten.
    ///
    /// # Arguments
    /// * `worker_id` - The worker that produced `values`.
    /// * `values` - The worker's parameters after its local steps.
    /// * `steps` - The amount of local steps `values` took.
    ///
    /// # Returns
    /// The global iteration counter after adding `steps`.
    pub fn fold(&self, worker_id: usize, values: &[f32], steps: usize) -> Result<usize> {
        let weight = self.active().max(1) as f32;

        {
            let mut global = self.values.lock();
            if global.len() != values.len() {
                return Err(MasterErr::ParamsLengthMismatch {
                    worker_id,
                    got: values.len(),
                    expected: global.len(),
                });
            }

            for (g, w) in global.iter_mut().zip(values) {
                *g += (w - *g) / weight;
            }
        }

        let mut iterations = self.iterations.lock();
        *iterations += steps;
        Ok(*iterations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_worker_fold_overwrites() {
        let params = GlobalParams::new(vec![5., -1.]);
        params.connect(0);

        assert_eq!(params.fold(0, &[2., 3.], 5).unwrap(), 5);
        assert_eq!(params.snapshot(), vec![2., 3.]);
    }

    #[test]
    fn fold_is_weighted_by_active_workers() {
        let params = GlobalParams::new(vec![0.]);
        params.connect(0);
        params.connect(1);

        params.fold(0, &[4.], 1).unwrap();
        assert_eq!(params.snapshot(), vec![2.]);

        params.release(0);
        assert!(params.is_released(0));
        assert_eq!(params.active(), 1);

        assert_eq!(params.fold(1, &[10.], 1).unwrap(), 2);
        assert_eq!(params.snapshot(), vec![10.]);
    }

    #[test]
    fn fold_rejects_wrong_sizes() {
        let params = GlobalParams::new(vec![0., 0.]);
        let err = params.fold(3, &[1.], 1).unwrap_err();

        assert!(matches!(
            err,
            MasterErr::ParamsLengthMismatch {
                worker_id: 3,
                got: 1,
                expected: 2
            }
        ));
        assert_eq!(params.iterations(), 0);
    }
}
