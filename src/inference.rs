use std::{fmt, path::Path};

use crate::{
    data::{images_to_tensor, HEIGHT, WIDTH},
    error::{Error, Result},
    model::Model,
    training::{checkpoint_path, config_path, CheckpointRecorder, TrainingConfig},
};
use burn::prelude::*;

/// Most likely class of an image and its probability as a percentage.
#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
    pub class: usize,
    pub confidence: f32,
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "it is a: {} with probability {:4.2}%",
            self.class, self.confidence
        )
    }
}

/// Rebuilds the trained model from `artifact_dir` and classifies the image at `image_path`.
///
/// Fails before building any model when the checkpoint or the image is missing.
pub fn infer<B: Backend>(
    artifact_dir: &Path,
    image_path: &Path,
    device: B::Device,
) -> Result<Prediction> {
    let checkpoint = checkpoint_path(artifact_dir);
    if !checkpoint.is_file() {
        return Err(Error::MissingCheckpoint(checkpoint));
    }
    if !image_path.is_file() {
        return Err(Error::MissingImage(image_path.to_path_buf()));
    }

    let pixels = load_image(image_path)?;
    let model = load_model::<B>(artifact_dir, &device)?;
    let prediction = predict(&model, pixels, &device);

    log::info!("{} => {prediction}", image_path.display());

    Ok(prediction)
}

/// Builds a model with the architecture saved at training time and loads the checkpoint into it.
pub fn load_model<B: Backend>(artifact_dir: &Path, device: &B::Device) -> Result<Model<B>> {
    let config = TrainingConfig::load(config_path(artifact_dir))?;
    let checkpoint = checkpoint_path(artifact_dir);

    let model = config.model.init::<B>(device).load_file(
        checkpoint.clone(),
        &CheckpointRecorder::new(),
        device,
    )?;
    log::info!("Model loaded from '{}'", checkpoint.display());

    Ok(model)
}

/// Decodes a grayscale image into raw row-major pixels in `0..=255`.
pub fn load_image(path: &Path) -> Result<Vec<f32>> {
    let image = image::open(path)
        .map_err(|source| Error::ImageDecode {
            path: path.to_path_buf(),
            source,
        })?
        .into_luma8();

    let (width, height) = image.dimensions();
    if width as usize != WIDTH || height as usize != HEIGHT {
        return Err(Error::ImageSize {
            width,
            height,
            expected_width: WIDTH as u32,
            expected_height: HEIGHT as u32,
        });
    }

    Ok(image.into_raw().into_iter().map(f32::from).collect())
}

/// Runs one inference-mode forward pass over a batch of one image.
pub fn predict<B: Backend>(model: &Model<B>, pixels: Vec<f32>, device: &B::Device) -> Prediction {
    let images = images_to_tensor::<B>(pixels, device);
    let (probability, class) = model.forward(images).max_dim_with_indices(1);

    Prediction {
        class: class.into_scalar().elem::<i64>() as usize,
        confidence: probability.into_scalar().elem::<f32>() * 100.0,
    }
}
