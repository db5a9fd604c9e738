//! Dense columnar storage addressed by `(slot, env)`.
use crate::frame::{Column, Frame};
use anyhow::Result;
use carousel_core::{error::ReplayError, BatchData, SlotTable};
use log::debug;
use std::collections::BTreeMap;

/// Column table backing [`ReplayBuffer`](carousel_core::replay_buffer::ReplayBuffer).
///
/// One contiguous array per field, shaped `[capacity, n_envs,
/// *field_shape]`. The field set, element types and field shapes are taken
/// from the first inserted batch and enforced on every later write.
pub struct ArrayTable {
    capacity: usize,
    n_envs: usize,
    columns: BTreeMap<String, Column>,
}

impl ArrayTable {
    fn column(&self, name: &str) -> Result<&Column> {
        match self.columns.get(name) {
            Some(column) => Ok(column),
            None => Err(ReplayError::UnknownField(name.to_string()).into()),
        }
    }
}

impl SlotTable for ArrayTable {
    type Data = Frame;

    fn alloc(capacity: usize, n_envs: usize, proto: &Frame) -> Result<Self> {
        if proto.batch_dims().len() != 2 {
            return Err(ReplayError::Shape(format!(
                "a prototype batch must have exactly two leading dimensions [len, n_envs], got {:?}",
                proto.batch_dims()
            ))
            .into());
        }
        let mut columns = BTreeMap::new();
        for (name, column) in proto.columns() {
            let mut shape = vec![capacity, n_envs];
            shape.extend_from_slice(&column.shape()[2..]);
            columns.insert(name.clone(), Column::zeros(column.dtype(), &shape));
        }
        debug!(
            "allocated table: {} fields, {} slots, {} envs",
            columns.len(),
            capacity,
            n_envs
        );
        Ok(Self {
            capacity,
            n_envs,
            columns,
        })
    }

    fn write(&mut self, ix: usize, data: &Frame) -> Result<()> {
        if data.columns().len() != self.columns.len()
            || !data.columns().keys().eq(self.columns.keys())
        {
            return Err(ReplayError::Shape(format!(
                "field set mismatch: batch has {:?}, the table stores {:?}",
                data.fields(),
                self.columns.keys().collect::<Vec<_>>()
            ))
            .into());
        }
        let capacity = self.capacity;
        for (name, column) in self.columns.iter_mut() {
            let rows = &data.columns()[name];
            if rows.shape()[1..] != column.shape()[1..] {
                return Err(ReplayError::Shape(format!(
                    "field '{}' has per-record shape {:?}, the table stores {:?}",
                    name,
                    &rows.shape()[1..],
                    &column.shape()[1..]
                ))
                .into());
            }
            column.write_rows(rows, ix, capacity)?;
        }
        Ok(())
    }

    fn gather(&self, slots: &[usize], envs: &[usize]) -> Result<Frame> {
        let mut columns = BTreeMap::new();
        for (name, column) in &self.columns {
            columns.insert(name.clone(), column.gather(slots, envs)?);
        }
        Ok(Frame::from_columns(vec![slots.len()], columns))
    }

    fn gather_field(&self, name: &str, slots: &[usize], envs: &[usize]) -> Result<Column> {
        self.column(name)?.gather(slots, envs)
    }

    fn gather_windows(&self, slots: &[usize], envs: &[usize], dims: [usize; 3]) -> Result<Frame> {
        let [n_samples, sequence_length, batch_size] = dims;
        // One environment per window, held constant across its steps.
        let envs_flat: Vec<usize> = envs
            .iter()
            .flat_map(|&env| std::iter::repeat(env).take(sequence_length))
            .collect();
        let mut columns = BTreeMap::new();
        for (name, column) in &self.columns {
            let flat = column.gather(slots, &envs_flat)?;
            columns.insert(
                name.clone(),
                flat.fold_windows(n_samples, sequence_length, batch_size)?,
            );
        }
        Ok(Frame::from_columns(
            vec![n_samples, sequence_length, batch_size],
            columns,
        ))
    }

    fn fields(&self) -> Vec<&str> {
        self.columns.keys().map(String::as_str).collect()
    }

    fn field(&self, name: &str) -> Result<&Column> {
        self.column(name)
    }

    fn set_field(&mut self, name: &str, field: Column) -> Result<()> {
        let column = match self.columns.get_mut(name) {
            Some(column) => column,
            None => return Err(ReplayError::UnknownField(name.to_string()).into()),
        };
        if field.dtype() != column.dtype() || field.shape() != column.shape() {
            return Err(ReplayError::Shape(format!(
                "replacement for '{}' is {:?} with shape {:?}, the table stores {:?} with shape {:?}",
                name,
                field.dtype(),
                field.shape(),
                column.dtype(),
                column.shape()
            ))
            .into());
        }
        *column = field;
        Ok(())
    }
}
