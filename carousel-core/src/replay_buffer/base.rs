//! Circular replay buffer over a slot table.
use super::{config::ReplayBufferConfig, cursor::Cursor};
use crate::{base::BatchData, error::ReplayError, SlotTable};
use anyhow::Result;
use log::warn;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Lifecycle of the lazily allocated table.
///
/// The table does not exist until the first insert reveals the field set;
/// reads before that point fail with
/// [`UninitializedStorage`](ReplayError::UninitializedStorage).
pub(super) enum TableState<T> {
    Unallocated,
    Allocated(T),
}

impl<T> TableState<T> {
    pub(super) fn get(&self) -> Result<&T> {
        match self {
            TableState::Unallocated => Err(ReplayError::UninitializedStorage.into()),
            TableState::Allocated(t) => Ok(t),
        }
    }

    fn get_mut(&mut self) -> Result<&mut T> {
        match self {
            TableState::Unallocated => Err(ReplayError::UninitializedStorage.into()),
            TableState::Allocated(t) => Ok(t),
        }
    }
}

/// A fixed-capacity circular replay buffer over several parallel
/// environments.
///
/// Records are stored in a `[capacity, n_envs]` grid of slots held by a
/// [`SlotTable`] backend. Batches are written at the cursor with wraparound
/// overwrite of the oldest data; [`sample`](ReplayBuffer::sample) draws
/// single records and [`sample_seq`](ReplayBuffer::sample_seq) draws
/// contiguous sequence windows, both uniformly with replacement and only
/// from slots that are valid to read.
///
/// The buffer is single-threaded: `add` mutates cursor and table state that
/// the samplers read, so concurrent producers and consumers must serialize
/// access externally.
///
/// # Examples
///
/// ```ignore
/// let config = ReplayBufferConfig::default().capacity(10000).n_envs(4);
/// let mut buffer = ReplayBuffer::<ArrayTable>::build(&config)?;
///
/// buffer.add(&frame)?;
/// let batch = buffer.sample(32, true)?;
/// let windows = buffer.sample_seq(16, 1, 50)?;
/// ```
pub struct ReplayBuffer<T>
where
    T: SlotTable,
{
    pub(super) cursor: Cursor,
    pub(super) table: TableState<T>,
    pub(super) rng: StdRng,
    next_field: String,
    next_field_into: String,
}

impl<T> ReplayBuffer<T>
where
    T: SlotTable,
{
    /// Builds a buffer from the given configuration.
    ///
    /// Fails with [`ReplayError::InvalidArgument`] if the configured
    /// capacity or environment count is zero.
    pub fn build(config: &ReplayBufferConfig) -> Result<Self> {
        Ok(Self {
            cursor: Cursor::new(config.capacity, config.n_envs)?,
            table: TableState::Unallocated,
            rng: StdRng::seed_from_u64(config.seed),
            next_field: config.next_field.clone(),
            next_field_into: config.next_field_into.clone(),
        })
    }

    /// Number of addressable slots.
    ///
    /// This equals the capacity regardless of how many records have been
    /// written, matching the shape of the underlying table rather than a
    /// count of valid entries.
    pub fn len(&self) -> usize {
        self.cursor.capacity()
    }

    /// Number of slots per environment.
    pub fn capacity(&self) -> usize {
        self.cursor.capacity()
    }

    /// Number of parallel environment streams.
    pub fn n_envs(&self) -> usize {
        self.cursor.n_envs()
    }

    /// Next slot to be overwritten.
    pub fn pos(&self) -> usize {
        self.cursor.pos()
    }

    /// Whether every slot has been written at least once.
    pub fn is_full(&self) -> bool {
        self.cursor.is_full()
    }

    /// Adds a batch of records at the cursor.
    ///
    /// The batch must carry exactly two leading dimensions `[len, n_envs]`
    /// with the buffer's environment count. The first insert allocates the
    /// table and fixes the schema; later inserts must conform.
    ///
    /// A batch longer than the capacity keeps only its trailing `capacity`
    /// records — older rows of the batch are dropped with a warning, not an
    /// error.
    pub fn add(&mut self, data: &T::Data) -> Result<()> {
        let dims = data.batch_dims();
        if dims.len() != 2 {
            return Err(ReplayError::Shape(format!(
                "a batch must have exactly two leading dimensions [len, n_envs], got {:?}",
                dims
            ))
            .into());
        }
        if dims[1] != self.cursor.n_envs() {
            return Err(ReplayError::Shape(format!(
                "batch carries {} environments, the buffer stores {}",
                dims[1],
                self.cursor.n_envs()
            ))
            .into());
        }
        if let TableState::Unallocated = self.table {
            let table = T::alloc(self.cursor.capacity(), self.cursor.n_envs(), data)?;
            self.table = TableState::Allocated(table);
        }
        let len = data.len();
        let plan = self.cursor.plan(len);
        if plan.kept < len {
            warn!(
                "batch of {} records exceeds capacity {}; keeping the trailing {}",
                len,
                self.cursor.capacity(),
                plan.kept
            );
            let tail = data.tail(plan.kept);
            self.table.get_mut()?.write(plan.start, &tail)?;
        } else if len > 0 {
            self.table.get_mut()?.write(plan.start, data)?;
        }
        self.cursor.commit(len);
        Ok(())
    }

    /// Samples `batch_size` records uniformly with replacement.
    ///
    /// Each draw picks a valid slot and, independently, a random environment.
    /// With `sample_next`, the field named by the configuration is also read
    /// at the successor slot (same environment) and attached to the result
    /// under the configured companion key; the slot whose successor holds
    /// stale data is then excluded from the draw.
    ///
    /// Fails with [`ReplayError::InvalidArgument`] on a zero batch size,
    /// [`ReplayError::EmptyBuffer`] before the first record, and
    /// [`ReplayError::InsufficientData`] when `sample_next` is requested
    /// with fewer than two sampleable records.
    pub fn sample(&mut self, batch_size: usize, sample_next: bool) -> Result<T::Data> {
        if batch_size == 0 {
            return Err(
                ReplayError::InvalidArgument("batch size must be greater than zero".into()).into(),
            );
        }
        let range = self.cursor.single_range(sample_next)?;
        let slots: Vec<usize> = (0..batch_size)
            .map(|_| range.get(self.rng.gen_range(0..range.len())))
            .collect();
        let n_envs = self.cursor.n_envs();
        let envs: Vec<usize> = (0..batch_size)
            .map(|_| self.rng.gen_range(0..n_envs))
            .collect();
        let table = self.table.get()?;
        let mut batch = table.gather(&slots, &envs)?;
        if sample_next {
            let capacity = self.cursor.capacity();
            let succ: Vec<usize> = slots.iter().map(|&s| (s + 1) % capacity).collect();
            let field = table.gather_field(&self.next_field, &succ, &envs)?;
            batch.insert(&self.next_field_into, field);
        }
        Ok(batch)
    }

    /// Field names of the schema.
    pub fn fields(&self) -> Result<Vec<&str>> {
        Ok(self.table.get()?.fields())
    }

    /// Returns the full column stored under `name`.
    pub fn field(&self, name: &str) -> Result<&<T::Data as BatchData>::Field> {
        self.table.get()?.field(name)
    }

    /// Replaces the column stored under `name` in place.
    pub fn set_field(&mut self, name: &str, field: <T::Data as BatchData>::Field) -> Result<()> {
        self.table.get_mut()?.set_field(name, field)
    }
}

#[cfg(test)]
pub(super) mod mock {
    //! A minimal slot table for exercising the engine without a backend.
    use crate::{base::BatchData, error::ReplayError, SlotTable};
    use anyhow::Result;

    /// Scalar records with explicit batch dims; one value per `(row, env)`.
    #[derive(Clone, Debug, PartialEq)]
    pub struct Rows {
        pub dims: Vec<usize>,
        pub vals: Vec<f32>,
        pub companion: Option<(String, Vec<f32>)>,
    }

    impl Rows {
        pub fn new(dims: Vec<usize>, vals: Vec<f32>) -> Self {
            Self {
                dims,
                vals,
                companion: None,
            }
        }
    }

    impl BatchData for Rows {
        type Field = Vec<f32>;

        fn batch_dims(&self) -> &[usize] {
            &self.dims
        }

        fn tail(&self, n: usize) -> Self {
            let n_envs = self.dims[1];
            let skip = (self.dims[0] - n) * n_envs;
            Rows::new(vec![n, n_envs], self.vals[skip..].to_vec())
        }

        fn insert(&mut self, name: &str, field: Self::Field) {
            self.companion = Some((name.to_string(), field));
        }
    }

    pub struct MockTable {
        capacity: usize,
        n_envs: usize,
        cells: Vec<f32>,
    }

    impl SlotTable for MockTable {
        type Data = Rows;

        fn alloc(capacity: usize, n_envs: usize, _proto: &Rows) -> Result<Self> {
            Ok(Self {
                capacity,
                n_envs,
                cells: vec![0.; capacity * n_envs],
            })
        }

        fn write(&mut self, ix: usize, data: &Rows) -> Result<()> {
            for j in 0..data.len() {
                let slot = (ix + j) % self.capacity;
                for e in 0..self.n_envs {
                    self.cells[slot * self.n_envs + e] = data.vals[j * self.n_envs + e];
                }
            }
            Ok(())
        }

        fn gather(&self, slots: &[usize], envs: &[usize]) -> Result<Rows> {
            let vals = slots
                .iter()
                .zip(envs)
                .map(|(&s, &e)| self.cells[s * self.n_envs + e])
                .collect();
            Ok(Rows::new(vec![slots.len()], vals))
        }

        fn gather_field(&self, name: &str, slots: &[usize], envs: &[usize]) -> Result<Vec<f32>> {
            if name != "value" {
                return Err(ReplayError::UnknownField(name.into()).into());
            }
            Ok(slots
                .iter()
                .zip(envs)
                .map(|(&s, &e)| self.cells[s * self.n_envs + e])
                .collect())
        }

        // Values stay flat window-major; only the dims are reshaped.
        fn gather_windows(&self, slots: &[usize], envs: &[usize], dims: [usize; 3]) -> Result<Rows> {
            let sequence_length = dims[1];
            let mut vals = Vec::with_capacity(slots.len());
            for (w, window) in slots.chunks(sequence_length).enumerate() {
                for &s in window {
                    vals.push(self.cells[s * self.n_envs + envs[w]]);
                }
            }
            Ok(Rows::new(dims.to_vec(), vals))
        }

        fn fields(&self) -> Vec<&str> {
            vec!["value"]
        }

        fn field(&self, name: &str) -> Result<&Vec<f32>> {
            if name != "value" {
                return Err(ReplayError::UnknownField(name.into()).into());
            }
            Ok(&self.cells)
        }

        fn set_field(&mut self, name: &str, field: Vec<f32>) -> Result<()> {
            if name != "value" {
                return Err(ReplayError::UnknownField(name.into()).into());
            }
            if field.len() != self.cells.len() {
                return Err(ReplayError::Shape("column size mismatch".into()).into());
            }
            self.cells = field;
            Ok(())
        }
    }

    /// Records numbered `range`, the same value in every environment.
    pub fn steps(range: std::ops::Range<usize>, n_envs: usize) -> Rows {
        let len = range.len();
        let vals = range
            .flat_map(|i| std::iter::repeat(i as f32).take(n_envs))
            .collect();
        Rows::new(vec![len, n_envs], vals)
    }

    pub fn buffer(capacity: usize, n_envs: usize) -> super::ReplayBuffer<MockTable> {
        let config = super::ReplayBufferConfig::default()
            .capacity(capacity)
            .n_envs(n_envs)
            .next_field("value")
            .next_field_into("next_value");
        super::ReplayBuffer::build(&config).unwrap()
    }
}
