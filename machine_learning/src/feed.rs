use std::{collections::BTreeMap, num::NonZeroUsize, ops::Range};

use comms::{NodeId, specs::model::FeedSpec};

/// Mapping from node id to a scalar value, used for variables and constants.
pub type ParamMap = BTreeMap<NodeId, f32>;

/// A column-oriented dataset, one sequence of values per feeder node.
///
/// Columns may have different lengths, the dataset is as long as its shortest column and
/// the trailing values of longer columns are ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedDict {
    columns: BTreeMap<NodeId, Vec<f32>>,
}

impl FeedDict {
    /// Creates a new empty `FeedDict`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the values of the feeder `id`, replacing any previous column.
    pub fn insert(&mut self, id: NodeId, values: Vec<f32>) {
        self.columns.insert(id, values);
    }

    /// The amount of rows, that is, the length of the shortest column.
    pub fn len(&self) -> usize {
        self.columns.values().map(Vec::len).min().unwrap_or(0)
    }

    /// Whether there are no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the values of the feeder `id`, if present.
    pub fn column(&self, id: NodeId) -> Option<&[f32]> {
        self.columns.get(&id).map(Vec::as_slice)
    }

    /// Returns an iterator over the feeder ids and their values.
    pub fn columns(&self) -> impl Iterator<Item = (NodeId, &[f32])> {
        self.columns.iter().map(|(&id, values)| (id, values.as_slice()))
    }

    /// Borrows every row.
    pub fn as_batch(&self) -> Batch<'_> {
        self.batch(0..self.len())
    }

    /// Borrows the rows in `range`, clipped to the length of the dataset.
    pub fn batch(&self, range: Range<usize>) -> Batch<'_> {
        let len = self.len();
        let end = range.end.min(len);
        let start = range.start.min(end);

        let columns = self
            .columns
            .iter()
            .map(|(&id, values)| (id, &values[start..end]))
            .collect();

        Batch {
            columns,
            rows: end - start,
        }
    }

    /// Extracts the data partition of worker `i` out of `p`.
    ///
    /// Each partition is the contiguous block `[ceil(n/p) * i, ceil(n/p) * (i + 1))` clipped to
    /// the `n` rows of the dataset, so the last blocks may be shorter or even empty.
    ///
    /// # Arguments
    /// * `i` - The index of the worker.
    /// * `p` - The amount of workers.
    pub fn partition(&self, i: usize, p: NonZeroUsize) -> FeedDict {
        let n = self.len();
        let size = n.div_ceil(p.get());
        let start = (size * i).min(n);
        let end = (size * (i + 1)).min(n);

        let columns = self
            .columns
            .iter()
            .map(|(&id, values)| (id, values[start..end].to_vec()))
            .collect();

        Self { columns }
    }

    /// Splits the dataset into `p` partitions, in worker order.
    pub fn partitions(&self, p: NonZeroUsize) -> Vec<FeedDict> {
        (0..p.get()).map(|i| self.partition(i, p)).collect()
    }

    /// Converts the dataset into its wire representation.
    pub fn to_spec(&self) -> Vec<FeedSpec> {
        self.columns()
            .map(|(id, values)| FeedSpec {
                id,
                values: values.to_vec(),
            })
            .collect()
    }
}

impl FromIterator<(NodeId, Vec<f32>)> for FeedDict {
    fn from_iter<T: IntoIterator<Item = (NodeId, Vec<f32>)>>(iter: T) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

impl From<&[FeedSpec]> for FeedDict {
    fn from(specs: &[FeedSpec]) -> Self {
        specs
            .iter()
            .map(|spec| (spec.id, spec.values.clone()))
            .collect()
    }
}

/// A borrowed set of rows of a `FeedDict`, every column has exactly `rows` values.
#[derive(Debug, Clone)]
pub struct Batch<'a> {
    columns: BTreeMap<NodeId, &'a [f32]>,
    rows: usize,
}

impl Batch<'_> {
    /// The amount of rows in the batch.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// The value of feeder `id` at `row`.
    pub fn value(&self, id: NodeId, row: usize) -> Option<f32> {
        self.columns.get(&id)?.get(row).copied()
    }
}
