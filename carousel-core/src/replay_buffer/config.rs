//! Configuration of the replay buffer.
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    default::Default,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`ReplayBuffer`](super::ReplayBuffer).
///
/// `capacity` is the number of slots per environment and `n_envs` the number
/// of parallel environment streams stored side by side; both must be greater
/// than zero. `seed` fixes the sampling RNG so runs are reproducible.
///
/// `next_field` names the field read at the successor slot when sampling
/// with next-step companions, and `next_field_into` the key under which the
/// companion is exposed in the sampled batch.
///
/// # Examples
///
/// ```rust
/// use carousel_core::replay_buffer::ReplayBufferConfig;
///
/// let config = ReplayBufferConfig::default()
///     .capacity(10000)
///     .n_envs(4)
///     .seed(42);
/// ```
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ReplayBufferConfig {
    /// Number of slots per environment. Once every slot has been written,
    /// new records replace the oldest ones.
    pub capacity: usize,

    /// Number of parallel environment streams.
    pub n_envs: usize,

    /// Seed of the sampling RNG.
    pub seed: u64,

    /// Field read at `slot + 1` for next-step companions.
    pub next_field: String,

    /// Key under which the next-step companion is exposed.
    pub next_field_into: String,
}

impl Default for ReplayBufferConfig {
    fn default() -> Self {
        Self {
            capacity: 10000,
            n_envs: 1,
            seed: 42,
            next_field: "observations".into(),
            next_field_into: "next_observations".into(),
        }
    }
}

impl ReplayBufferConfig {
    /// Sets the capacity of the buffer.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the number of environments.
    pub fn n_envs(mut self, n_envs: usize) -> Self {
        self.n_envs = n_envs;
        self
    }

    /// Sets the seed of the sampling RNG.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the field read at the successor slot for next-step companions.
    pub fn next_field(mut self, next_field: impl Into<String>) -> Self {
        self.next_field = next_field.into();
        self
    }

    /// Sets the key under which the next-step companion is exposed.
    pub fn next_field_into(mut self, next_field_into: impl Into<String>) -> Self {
        self.next_field_into = next_field_into.into();
        self
    }

    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves the configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
