//! Model checkpointing and serialization utilities.
//!
//! Weights are stored with Burn's named MessagePack recorder (`*.mpk`). The
//! model configuration travels next to them as a JSON metadata file so a
//! checkpoint can be reloaded without knowing its input size in advance.
//!
//! # Example
//!
//! ```rust,ignore
//! use cfx_models::checkpoint::{load_image_mlp, save_image_mlp};
//! use cfx_models::ImageMlpConfig;
//!
//! let config = ImageMlpConfig::new(1, 64);
//! let model = config.init::<NdArray>(&device);
//!
//! save_image_mlp(&model, &config, "model.mpk")?;
//! let (loaded, config) = load_image_mlp::<NdArray>("model.mpk", &device)?;
//! ```

use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder};

use crate::mlp::{ImageMlp, ImageMlpConfig};

/// Save a model's weights to a checkpoint file.
pub fn save_model<B, M>(model: &M, path: impl AsRef<Path>) -> Result<()>
where
    B: Backend,
    M: Module<B>,
{
    let record = model.clone().into_record();
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    Recorder::<B>::record(&recorder, record, path.as_ref().to_path_buf())
        .map_err(|e| CheckpointError::Save(e.to_string()))?;
    Ok(())
}

/// Load a model record from a checkpoint file.
pub fn load_record<B, M>(path: impl AsRef<Path>, device: &B::Device) -> Result<M::Record>
where
    B: Backend,
    M: Module<B>,
{
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    Recorder::<B>::load(&recorder, path.as_ref().to_path_buf(), device)
        .map_err(|e| CheckpointError::Load(e.to_string()))
}

/// Path of the metadata file that accompanies a checkpoint.
pub fn metadata_path(checkpoint: impl AsRef<Path>) -> PathBuf {
    checkpoint.as_ref().with_extension("json")
}

/// Checkpoint metadata.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CheckpointMetadata {
    /// Model architecture name.
    pub arch: String,
    /// Model configuration.
    pub config: ImageMlpConfig,
    /// Seed used to initialise the weights, if known.
    pub seed: Option<u64>,
}

impl CheckpointMetadata {
    /// Create new metadata for an [`ImageMlp`].
    pub fn new(config: ImageMlpConfig) -> Self {
        Self {
            arch: "image_mlp".to_string(),
            config,
            seed: None,
        }
    }

    /// Record the initialisation seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Save metadata to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| CheckpointError::Save(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| CheckpointError::Save(e.to_string()))?;
        Ok(())
    }

    /// Load metadata from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json =
            std::fs::read_to_string(path).map_err(|e| CheckpointError::Load(e.to_string()))?;
        let metadata: Self =
            serde_json::from_str(&json).map_err(|e| CheckpointError::Load(e.to_string()))?;
        if metadata.arch != "image_mlp" {
            return Err(CheckpointError::InvalidFormat(format!(
                "unknown architecture '{}'",
                metadata.arch
            )));
        }
        Ok(metadata)
    }
}

/// Save an [`ImageMlp`] together with its metadata.
pub fn save_image_mlp<B: Backend>(
    model: &ImageMlp<B>,
    metadata: &CheckpointMetadata,
    path: impl AsRef<Path>,
) -> Result<()> {
    let path = path.as_ref();
    save_model::<B, ImageMlp<B>>(model, path)?;
    metadata.save(metadata_path(path))
}

/// Load an [`ImageMlp`] and its metadata.
pub fn load_image_mlp<B: Backend>(
    path: impl AsRef<Path>,
    device: &B::Device,
) -> Result<(ImageMlp<B>, CheckpointMetadata)> {
    let path = path.as_ref();
    let metadata = CheckpointMetadata::load(metadata_path(path))?;
    let model = metadata
        .config
        .init::<B>(device)
        .load_checkpoint(path, device)?;
    Ok((model, metadata))
}

/// Result type for checkpoint operations.
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Checkpoint-related errors.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// Error saving checkpoint.
    #[error("Failed to save checkpoint: {0}")]
    Save(String),

    /// Error loading checkpoint.
    #[error("Failed to load checkpoint: {0}")]
    Load(String),

    /// Invalid format.
    #[error("Invalid checkpoint format: {0}")]
    InvalidFormat(String),
}

/// Extension trait for models to add checkpoint methods.
pub trait ModelCheckpoint<B: Backend>: Module<B> {
    /// Save the model to a checkpoint file.
    fn save_checkpoint(&self, path: impl AsRef<Path>) -> Result<()> {
        save_model::<B, Self>(self, path)
    }

    /// Load model from a checkpoint into an existing model.
    fn load_checkpoint(&self, path: impl AsRef<Path>, device: &B::Device) -> Result<Self>
    where
        Self: Sized,
    {
        let record = load_record::<B, Self>(path, device)?;
        Ok(self.clone().load_record(record))
    }
}

// Implement for all modules
impl<B: Backend, M: Module<B>> ModelCheckpoint<B> for M {}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    fn logits(model: &ImageMlp<TestBackend>) -> Vec<f32> {
        let x = Tensor::<TestBackend, 4>::full([1, 1, 4, 4], 0.25, &Default::default());
        model
            .forward(x)
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .unwrap()
    }

    #[test]
    fn test_metadata_path() {
        assert_eq!(metadata_path("out/model.mpk"), PathBuf::from("out/model.json"));
    }

    #[test]
    fn test_metadata_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let meta = CheckpointMetadata::new(ImageMlpConfig::new(1, 16)).with_seed(7);

        meta.save(&path).unwrap();
        assert_eq!(CheckpointMetadata::load(&path).unwrap(), meta);
    }

    #[test]
    fn test_rejects_unknown_arch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let mut meta = CheckpointMetadata::new(ImageMlpConfig::new(1, 16));
        meta.arch = "resnet".to_string();
        meta.save(&path).unwrap();

        assert!(matches!(
            CheckpointMetadata::load(&path),
            Err(CheckpointError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_image_mlp_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.mpk");
        let device = Default::default();
        let config = ImageMlpConfig::new(1, 4).with_hidden_sizes(vec![6]);
        let model = config.init::<TestBackend>(&device);

        save_image_mlp(&model, &CheckpointMetadata::new(config.clone()), &path).unwrap();
        let (loaded, metadata) = load_image_mlp::<TestBackend>(&path, &device).unwrap();

        assert_eq!(metadata.config, config);
        assert_eq!(logits(&model), logits(&loaded));
    }

    #[test]
    fn test_checkpoint_trait_restores_weights() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.mpk");
        let device = Default::default();
        let config = ImageMlpConfig::new(1, 4).with_hidden_sizes(vec![5]);
        let trained = config.init::<TestBackend>(&device);
        trained.save_checkpoint(&path).unwrap();

        let fresh = config.init::<TestBackend>(&device);
        let restored = fresh.load_checkpoint(&path, &device).unwrap();
        assert_eq!(logits(&trained), logits(&restored));
    }

    #[test]
    fn test_missing_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_image_mlp::<TestBackend>(dir.path().join("absent.mpk"), &Default::default()),
            Err(CheckpointError::Load(_))
        ));
    }
}
