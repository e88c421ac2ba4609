// SPDX-FileCopyrightText: Copyright 2025 Sightline Contributors
// SPDX-License-Identifier: Apache-2.0

/*!
## Sightline - Tensors

`sightline_tensor` provides the owned numeric buffers that flow between the
pipeline stages: the preprocessed model input, and the raw model output
handed to the decoder. A tensor owns its storage and frees it when dropped,
so a pipeline pass that keeps its tensors on the stack never accumulates
buffers across frames.

```rust
# use sightline_tensor::{Tensor, TensorTrait, TensorMapTrait};
# fn main() -> sightline_tensor::Result<()> {
let mut tensor = Tensor::<f32>::new(&[1, 4, 4, 3], Some("input"))?;
{
    let mut map = tensor.map_mut();
    map[0] = 1.0;
}
assert_eq!(tensor.len(), 48);
assert_eq!(tensor.map()[0], 1.0);
# Ok(())
# }
```
*/

pub use error::{Error, Result};

use log::trace;
use ndarray::{ArrayViewD, IxDyn};
use num_traits::Num;
use std::{
    fmt,
    ops::{Deref, DerefMut},
};

mod error;

pub trait TensorTrait<T>
where
    T: Num + Clone + fmt::Debug,
{
    fn new(shape: &[usize], name: Option<&str>) -> Result<Self>
    where
        Self: Sized;

    fn name(&self) -> String;

    fn len(&self) -> usize {
        self.shape().iter().product()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn size(&self) -> usize {
        self.len() * std::mem::size_of::<T>()
    }

    fn shape(&self) -> &[usize];

    fn reshape(&mut self, shape: &[usize]) -> Result<()>;

    fn map(&self) -> TensorMap<'_, T>;

    fn map_mut(&mut self) -> TensorMapMut<'_, T>;
}

pub trait TensorMapTrait<T>
where
    T: Num + Clone + fmt::Debug,
{
    fn shape(&self) -> &[usize];

    fn unmap(&mut self);

    fn len(&self) -> usize {
        self.shape().iter().product()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn size(&self) -> usize {
        self.len() * std::mem::size_of::<T>()
    }
}

/// A named, shaped buffer stored in system memory.
pub struct Tensor<T>
where
    T: Num + Clone + fmt::Debug,
{
    name: String,
    shape: Vec<usize>,
    data: Vec<T>,
}

impl<T> Tensor<T>
where
    T: Num + Clone + fmt::Debug,
{
    /// Wraps an existing buffer. The buffer length must equal the volume of
    /// `shape`.
    pub fn from_vec(data: Vec<T>, shape: &[usize], name: Option<&str>) -> Result<Self> {
        let volume = checked_volume(shape)?;
        if volume != data.len() {
            return Err(Error::ShapeMismatch(format!(
                "buffer of {} elements cannot have shape {:?}",
                data.len(),
                shape
            )));
        }
        Ok(Self {
            name: name.unwrap_or("mem_tensor").to_owned(),
            shape: shape.to_vec(),
            data,
        })
    }

    /// Borrows the tensor as a dynamically shaped ndarray view.
    pub fn view(&self) -> Result<ArrayViewD<'_, T>> {
        Ok(ArrayViewD::from_shape(IxDyn(&self.shape), &self.data)?)
    }

    /// Releases the tensor, returning the underlying buffer.
    pub fn into_vec(mut self) -> Vec<T> {
        std::mem::take(&mut self.data)
    }
}

fn checked_volume(shape: &[usize]) -> Result<usize> {
    if shape.is_empty() {
        return Err(Error::InvalidSize(0));
    }
    let volume = shape.iter().product::<usize>();
    if volume == 0 {
        return Err(Error::InvalidSize(0));
    }
    Ok(volume)
}

impl<T> TensorTrait<T> for Tensor<T>
where
    T: Num + Clone + fmt::Debug,
{
    fn new(shape: &[usize], name: Option<&str>) -> Result<Self> {
        let volume = checked_volume(shape)?;
        Ok(Self {
            name: name.unwrap_or("mem_tensor").to_owned(),
            shape: shape.to_vec(),
            data: vec![T::zero(); volume],
        })
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn reshape(&mut self, shape: &[usize]) -> Result<()> {
        let new_len = checked_volume(shape)?;
        if new_len != self.len() {
            return Err(Error::ShapeMismatch(format!(
                "Cannot reshape incompatible shape: {:?} to {:?}",
                self.shape, shape
            )));
        }

        self.shape = shape.to_vec();
        Ok(())
    }

    fn map(&self) -> TensorMap<'_, T> {
        TensorMap {
            data: &self.data,
            shape: &self.shape,
        }
    }

    fn map_mut(&mut self) -> TensorMapMut<'_, T> {
        TensorMapMut {
            data: &mut self.data,
            shape: &self.shape,
        }
    }
}

impl<T> fmt::Debug for Tensor<T>
where
    T: Num + Clone + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("name", &self.name)
            .field("shape", &self.shape)
            .finish()
    }
}

impl<T> Drop for Tensor<T>
where
    T: Num + Clone + fmt::Debug,
{
    fn drop(&mut self) {
        trace!("Releasing tensor {} {:?}", self.name, self.shape);
    }
}

/// Read-only view of a tensor's storage.
pub struct TensorMap<'a, T>
where
    T: Num + Clone + fmt::Debug,
{
    data: &'a [T],
    shape: &'a [usize],
}

impl<T> TensorMap<'_, T>
where
    T: Num + Clone + fmt::Debug,
{
    pub fn as_slice(&self) -> &[T] {
        self.data
    }
}

impl<'a, T> TensorMap<'a, T>
where
    T: Num + Clone + fmt::Debug,
{
    /// Consumes the view, keeping the borrow of the underlying tensor.
    pub fn into_slice(self) -> &'a [T] {
        self.data
    }
}

impl<T> TensorMapTrait<T> for TensorMap<'_, T>
where
    T: Num + Clone + fmt::Debug,
{
    fn shape(&self) -> &[usize] {
        self.shape
    }

    fn unmap(&mut self) {
        trace!("Unmapping tensor view");
    }
}

impl<T> Deref for TensorMap<'_, T>
where
    T: Num + Clone + fmt::Debug,
{
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.data
    }
}

/// Writable view of a tensor's storage.
pub struct TensorMapMut<'a, T>
where
    T: Num + Clone + fmt::Debug,
{
    data: &'a mut [T],
    shape: &'a [usize],
}

impl<T> TensorMapMut<'_, T>
where
    T: Num + Clone + fmt::Debug,
{
    pub fn as_slice(&self) -> &[T] {
        self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        self.data
    }
}

impl<T> TensorMapTrait<T> for TensorMapMut<'_, T>
where
    T: Num + Clone + fmt::Debug,
{
    fn shape(&self) -> &[usize] {
        self.shape
    }

    fn unmap(&mut self) {
        trace!("Unmapping mutable tensor view");
    }
}

impl<T> Deref for TensorMapMut<'_, T>
where
    T: Num + Clone + fmt::Debug,
{
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.data
    }
}

impl<T> DerefMut for TensorMapMut<'_, T>
where
    T: Num + Clone + fmt::Debug,
{
    fn deref_mut(&mut self) -> &mut [T] {
        self.data
    }
}

impl<T> Drop for TensorMapMut<'_, T>
where
    T: Num + Clone + fmt::Debug,
{
    fn drop(&mut self) {
        self.unmap();
    }
}
