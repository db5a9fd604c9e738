//! Batches of named, typed columns.
use anyhow::Result;
use carousel_core::{error::ReplayError, BatchData};
use ndarray::{Array, ArrayD, ArrayViewD, Axis, Dimension, IxDyn, Slice};
use std::collections::BTreeMap;

/// Element type of a [`Column`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dtype {
    /// 32-bit floating point.
    F32,
    /// 64-bit signed integer.
    I64,
    /// Unsigned byte.
    U8,
}

/// One named column of a batch or table: a dynamically shaped array of one
/// of the supported element types.
#[derive(Clone, Debug, PartialEq)]
pub enum Column {
    /// 32-bit float values.
    F32(ArrayD<f32>),
    /// 64-bit integer values.
    I64(ArrayD<i64>),
    /// Byte values.
    U8(ArrayD<u8>),
}

impl Column {
    /// Element type of the column.
    pub fn dtype(&self) -> Dtype {
        match self {
            Column::F32(_) => Dtype::F32,
            Column::I64(_) => Dtype::I64,
            Column::U8(_) => Dtype::U8,
        }
    }

    /// Shape of the column, leading batch dimensions included.
    pub fn shape(&self) -> &[usize] {
        match self {
            Column::F32(a) => a.shape(),
            Column::I64(a) => a.shape(),
            Column::U8(a) => a.shape(),
        }
    }

    /// A zero-filled column of the given element type and shape.
    pub(crate) fn zeros(dtype: Dtype, shape: &[usize]) -> Column {
        match dtype {
            Dtype::F32 => Column::F32(ArrayD::zeros(IxDyn(shape))),
            Dtype::I64 => Column::I64(ArrayD::zeros(IxDyn(shape))),
            Dtype::U8 => Column::U8(ArrayD::zeros(IxDyn(shape))),
        }
    }

    /// A copy of the trailing `n` rows along the leading axis.
    pub(crate) fn tail(&self, n: usize) -> Column {
        fn tail_of<T: Clone>(a: &ArrayD<T>, n: usize) -> ArrayD<T> {
            let start = a.len_of(Axis(0)) - n;
            a.slice_axis(Axis(0), Slice::from(start..)).to_owned()
        }
        match self {
            Column::F32(a) => Column::F32(tail_of(a, n)),
            Column::I64(a) => Column::I64(tail_of(a, n)),
            Column::U8(a) => Column::U8(tail_of(a, n)),
        }
    }

    /// Writes the rows of `data` into consecutive slots starting at `start`,
    /// wrapping modulo `capacity`. Fails if the element types differ.
    pub(crate) fn write_rows(&mut self, data: &Column, start: usize, capacity: usize) -> Result<()> {
        fn write_of<T: Clone>(col: &mut ArrayD<T>, rows: &ArrayD<T>, start: usize, capacity: usize) {
            for (j, row) in rows.axis_iter(Axis(0)).enumerate() {
                col.index_axis_mut(Axis(0), (start + j) % capacity).assign(&row);
            }
        }
        match (self, data) {
            (Column::F32(col), Column::F32(rows)) => write_of(col, rows, start, capacity),
            (Column::I64(col), Column::I64(rows)) => write_of(col, rows, start, capacity),
            (Column::U8(col), Column::U8(rows)) => write_of(col, rows, start, capacity),
            (col, rows) => {
                return Err(ReplayError::Shape(format!(
                    "element type mismatch: the table stores {:?}, the batch holds {:?}",
                    col.dtype(),
                    rows.dtype()
                ))
                .into())
            }
        }
        Ok(())
    }

    /// Gathers the rows at the given `(slot, env)` pairs into a new column
    /// with `slots.len()` as its leading dimension.
    pub(crate) fn gather(&self, slots: &[usize], envs: &[usize]) -> Result<Column> {
        fn gather_of<T: Clone>(col: &ArrayD<T>, slots: &[usize], envs: &[usize]) -> Result<ArrayD<T>> {
            let views: Vec<ArrayViewD<T>> = slots
                .iter()
                .zip(envs)
                .map(|(&slot, &env)| col.index_axis(Axis(0), slot).index_axis_move(Axis(0), env))
                .collect();
            Ok(ndarray::stack(Axis(0), &views)?)
        }
        Ok(match self {
            Column::F32(a) => Column::F32(gather_of(a, slots, envs)?),
            Column::I64(a) => Column::I64(gather_of(a, slots, envs)?),
            Column::U8(a) => Column::U8(gather_of(a, slots, envs)?),
        })
    }

    /// Reshapes a flat gather of `n_samples * batch_size` windows, each of
    /// `sequence_length` rows, into `[n_samples, sequence_length,
    /// batch_size, *field_shape]`.
    pub(crate) fn fold_windows(
        self,
        n_samples: usize,
        sequence_length: usize,
        batch_size: usize,
    ) -> Result<Column> {
        fn fold_of<T: Clone>(
            flat: ArrayD<T>,
            n_samples: usize,
            sequence_length: usize,
            batch_size: usize,
        ) -> Result<ArrayD<T>> {
            // Flat rows are ordered (sample, batch, step); the step axis is
            // moved ahead of the batch axis for the public layout.
            let mut shape = vec![n_samples, batch_size, sequence_length];
            shape.extend_from_slice(&flat.shape()[1..]);
            let grouped = flat.into_shape(IxDyn(&shape))?;
            let mut axes: Vec<usize> = (0..grouped.ndim()).collect();
            axes.swap(1, 2);
            Ok(grouped.permuted_axes(IxDyn(&axes)).as_standard_layout().into_owned())
        }
        Ok(match self {
            Column::F32(a) => Column::F32(fold_of(a, n_samples, sequence_length, batch_size)?),
            Column::I64(a) => Column::I64(fold_of(a, n_samples, sequence_length, batch_size)?),
            Column::U8(a) => Column::U8(fold_of(a, n_samples, sequence_length, batch_size)?),
        })
    }
}

impl<D: Dimension> From<Array<f32, D>> for Column {
    fn from(a: Array<f32, D>) -> Self {
        Column::F32(a.into_dyn())
    }
}

impl<D: Dimension> From<Array<i64, D>> for Column {
    fn from(a: Array<i64, D>) -> Self {
        Column::I64(a.into_dyn())
    }
}

impl<D: Dimension> From<Array<u8, D>> for Column {
    fn from(a: Array<u8, D>) -> Self {
        Column::U8(a.into_dyn())
    }
}

/// A batch of records: named columns sharing their leading batch dimensions.
///
/// Batches handed to [`ReplayBuffer::add`] carry the two batch dimensions
/// `[len, n_envs]`; batches returned by the samplers carry `[batch_size]` or
/// `[n_samples, sequence_length, batch_size]`.
///
/// [`ReplayBuffer::add`]: carousel_core::replay_buffer::ReplayBuffer::add
///
/// # Examples
///
/// ```rust
/// use carousel_ndarray::Frame;
/// use ndarray::Array3;
///
/// // 2 steps, 1 environment, observations of 4 floats each.
/// let obs = Array3::<f32>::zeros((2, 1, 4));
/// let frame = Frame::new([2, 1]).with_field("observations", obs).unwrap();
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Frame {
    batch_dims: Vec<usize>,
    columns: BTreeMap<String, Column>,
}

impl Frame {
    /// Creates an empty frame with the given batch dimensions.
    pub fn new(batch_dims: impl Into<Vec<usize>>) -> Self {
        Self {
            batch_dims: batch_dims.into(),
            columns: BTreeMap::new(),
        }
    }

    /// Adds a column whose shape must begin with the batch dimensions.
    pub fn with_field(mut self, name: impl Into<String>, column: impl Into<Column>) -> Result<Self> {
        let name = name.into();
        let column = column.into();
        if !column.shape().starts_with(&self.batch_dims) {
            return Err(ReplayError::Shape(format!(
                "column '{}' has shape {:?}, expected the leading batch dims {:?}",
                name,
                column.shape(),
                self.batch_dims
            ))
            .into());
        }
        self.columns.insert(name, column);
        Ok(self)
    }

    /// Returns the column stored under `name`, if any.
    pub fn field(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Field names in enumeration order.
    pub fn fields(&self) -> Vec<&str> {
        self.columns.keys().map(String::as_str).collect()
    }

    pub(crate) fn columns(&self) -> &BTreeMap<String, Column> {
        &self.columns
    }

    pub(crate) fn from_columns(
        batch_dims: Vec<usize>,
        columns: BTreeMap<String, Column>,
    ) -> Self {
        Self {
            batch_dims,
            columns,
        }
    }
}

impl BatchData for Frame {
    type Field = Column;

    fn batch_dims(&self) -> &[usize] {
        &self.batch_dims
    }

    fn tail(&self, n: usize) -> Self {
        let mut batch_dims = self.batch_dims.clone();
        batch_dims[0] = n;
        let columns = self
            .columns
            .iter()
            .map(|(name, column)| (name.clone(), column.tail(n)))
            .collect();
        Self {
            batch_dims,
            columns,
        }
    }

    fn insert(&mut self, name: &str, field: Column) {
        self.columns.insert(name.to_string(), field);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2, Array3};

    #[test]
    fn with_field_checks_batch_dims() {
        let ok = Array3::<f32>::zeros((2, 1, 4));
        let frame = Frame::new([2, 1]).with_field("observations", ok).unwrap();
        assert_eq!(frame.fields(), vec!["observations"]);

        let bad = Array2::<f32>::zeros((3, 1));
        assert!(Frame::new([2, 1]).with_field("observations", bad).is_err());
    }

    #[test]
    fn from_impls_pick_the_element_type() {
        assert_eq!(Column::from(Array1::<f32>::zeros(3)).dtype(), Dtype::F32);
        assert_eq!(Column::from(Array1::<i64>::zeros(3)).dtype(), Dtype::I64);
        assert_eq!(Column::from(Array1::<u8>::zeros(3)).dtype(), Dtype::U8);
    }

    #[test]
    fn tail_keeps_trailing_rows() {
        let vals = Array2::from_shape_vec((4, 1), vec![0., 1., 2., 3.]).unwrap();
        let frame = Frame::new([4, 1]).with_field("values", vals).unwrap();
        let tail = frame.tail(2);
        assert_eq!(tail.batch_dims(), &[2, 1]);
        match tail.field("values").unwrap() {
            Column::F32(a) => assert_eq!(a.as_slice().unwrap(), &[2., 3.]),
            _ => panic!("expected an f32 column"),
        }
    }

    #[test]
    fn insert_attaches_a_companion_column() {
        let vals = Array2::<f32>::zeros((2, 1));
        let mut frame = Frame::new([2, 1]).with_field("observations", vals).unwrap();
        frame.insert("next_observations", Column::from(Array1::<f32>::zeros(2)));
        assert_eq!(frame.fields(), vec!["next_observations", "observations"]);
    }
}
