use std::{collections::BTreeMap, io::Cursor, sync::Arc};

use crate::{EngineErr, Result};

/// A byte buffer handed to or filled by the inference engine.
///
/// The cursor position is the engine's read/write position inside the buffer.
pub type Tensor = Cursor<Vec<u8>>;

/// An ordered list of opaque layer buffers, one per model layer.
pub type WeightSet = Vec<Vec<u8>>;

/// Creates a zero filled tensor of `len` bytes.
pub fn zeroed(len: usize) -> Tensor {
    Cursor::new(vec![0; len])
}

/// Named tensors used as the inputs and outputs of a signature.
#[derive(Debug, Default)]
pub struct TensorMap {
    tensors: BTreeMap<String, Tensor>,
    marked: bool,
}

impl TensorMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a map without tensors that still reports itself as non empty.
    ///
    /// Some engines refuse to run a signature with an empty input map even if
    /// the signature takes no inputs.
    pub fn marked_non_empty() -> Self {
        Self {
            tensors: BTreeMap::new(),
            marked: true,
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, tensor: Tensor) {
        self.tensors.insert(name.into(), tensor);
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.tensors.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Tensor> {
        self.tensors.get_mut(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Tensor> {
        self.tensors.remove(name)
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        !self.marked && self.tensors.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }
}

/// Converts between positional weight sets and the named layer map the
/// inference engine consumes.
///
/// Layer `i` is always named `a{i}`.
#[derive(Debug, Clone)]
pub struct ParameterCodec {
    layer_sizes: Arc<[usize]>,
}

impl ParameterCodec {
    /// Creates a new `ParameterCodec`.
    ///
    /// # Arguments
    /// * `layer_sizes` - The size in bytes of every layer, in positional order.
    pub fn new(layer_sizes: impl Into<Arc<[usize]>>) -> Self {
        Self {
            layer_sizes: layer_sizes.into(),
        }
    }

    pub fn layer_sizes(&self) -> &[usize] {
        &self.layer_sizes
    }

    pub fn layer_count(&self) -> usize {
        self.layer_sizes.len()
    }

    pub fn layer_name(index: usize) -> String {
        format!("a{index}")
    }

    fn check_count(&self, got: usize) -> Result<()> {
        let expected = self.layer_count();
        if got != expected {
            return Err(EngineErr::LayerCountMismatch { got, expected });
        }

        Ok(())
    }

    /// Names every layer of `weights` by its position.
    ///
    /// # Arguments
    /// * `weights` - One buffer per layer.
    ///
    /// # Returns
    /// The named map or `LayerCountMismatch` if the amount of layers is wrong.
    pub fn encode(&self, weights: WeightSet) -> Result<TensorMap> {
        self.check_count(weights.len())?;

        let mut map = TensorMap::new();
        for (i, layer) in weights.into_iter().enumerate() {
            map.insert(Self::layer_name(i), Cursor::new(layer));
        }

        Ok(map)
    }

    /// Takes the layers back out of a named map, in positional order.
    ///
    /// Every buffer is rewound so consumers read it from the start.
    ///
    /// # Arguments
    /// * `map` - A map holding exactly one `a{i}` entry per layer.
    ///
    /// # Returns
    /// The weight set or `LayerCountMismatch` if entries are missing or extra.
    pub fn decode(&self, mut map: TensorMap) -> Result<WeightSet> {
        let got = map.len();
        self.check_count(got)?;

        (0..self.layer_count())
            .map(|i| {
                let mut tensor = map
                    .remove(&Self::layer_name(i))
                    .ok_or(EngineErr::LayerCountMismatch {
                        got: i,
                        expected: self.layer_count(),
                    })?;

                tensor.set_position(0);
                Ok(tensor.into_inner())
            })
            .collect()
    }

    /// Creates the output map for signatures that emit the weights, one zeroed
    /// buffer of the configured size per layer.
    pub fn empty_map(&self) -> TensorMap {
        let mut map = TensorMap::new();
        for (i, &size) in self.layer_sizes.iter().enumerate() {
            map.insert(Self::layer_name(i), zeroed(size));
        }

        map
    }
}
