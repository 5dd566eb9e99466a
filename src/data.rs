use burn::{
    data::{dataloader::batcher::Batcher, dataset::vision::MnistItem},
    prelude::*,
};

/// Width of an MNIST image in pixels.
pub const WIDTH: usize = 28;
/// Height of an MNIST image in pixels.
pub const HEIGHT: usize = 28;
/// Length of a flattened image, the width of the model input.
pub const INPUT_SIZE: usize = WIDTH * HEIGHT;
/// Number of digit classes.
pub const NUM_CLASSES: usize = 10;

const PIXEL_MAX: f32 = 255.0;

/// Number of batches needed to cover `num_items` items, the last one possibly shorter.
pub fn num_batches(num_items: usize, batch_size: usize) -> usize {
    num_items.div_ceil(batch_size)
}

/// Builds a `[batch_size, INPUT_SIZE]` tensor from raw pixels in `0..=255`.
///
/// This is the only place where pixels get scaled into the unit interval, both the
/// training batcher and the inference path go through it.
///
/// # Panics
///
/// If `pixels` does not hold a whole number of flattened images.
pub fn images_to_tensor<B: Backend>(pixels: Vec<f32>, device: &B::Device) -> Tensor<B, 2> {
    assert_eq!(
        pixels.len() % INPUT_SIZE,
        0,
        "Pixel buffer should hold whole {WIDTH}x{HEIGHT} images"
    );
    let batch_size = pixels.len() / INPUT_SIZE;

    let data = TensorData::new(pixels, [batch_size, INPUT_SIZE]).convert::<B::FloatElem>();

    Tensor::<B, 2>::from_data(data, device) / PIXEL_MAX
}

/// Flattens a 2D image row by row.
fn flatten(image: &[[f32; WIDTH]; HEIGHT]) -> impl Iterator<Item = f32> + '_ {
    image.iter().flat_map(|row| row.iter().copied())
}

#[derive(Clone, Debug)]
pub struct MnistBatcher<B: Backend> {
    device: B::Device,
}

#[derive(Clone, Debug)]
pub struct MnistBatch<B: Backend> {
    pub images: Tensor<B, 2>,
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> MnistBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<MnistItem, MnistBatch<B>> for MnistBatcher<B> {
    fn batch(&self, items: Vec<MnistItem>) -> MnistBatch<B> {
        let pixels = items
            .iter()
            .flat_map(|item| flatten(&item.image))
            .collect::<Vec<_>>();
        let images = images_to_tensor::<B>(pixels, &self.device);

        let targets = items
            .iter()
            .map(|item| (item.label as i64).elem::<B::IntElem>())
            .collect::<Vec<_>>();
        let targets = Tensor::<B, 1, Int>::from_data(
            TensorData::new(targets, [items.len()]),
            &self.device,
        );

        MnistBatch { images, targets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TestBackend;

    fn item(value: f32, label: u8) -> MnistItem {
        let mut image = [[value; WIDTH]; HEIGHT];
        image[0][1] = 255.0;
        image[HEIGHT - 1][WIDTH - 1] = 0.0;
        MnistItem { image, label }
    }

    #[test]
    fn one_epoch_of_train_split_is_1875_batches() {
        assert_eq!(num_batches(60_000, 32), 1875);
        assert_eq!(num_batches(10_000, 32), 313);
        assert_eq!(num_batches(5, 32), 1);
        assert_eq!(num_batches(0, 32), 0);
    }

    #[test]
    fn pixels_are_scaled_to_unit_interval() {
        let device = Default::default();
        let mut pixels = vec![0.0; INPUT_SIZE];
        pixels[0] = 255.0;
        pixels[1] = 51.0;

        let tensor = images_to_tensor::<TestBackend>(pixels, &device);
        let values = tensor.into_data().to_vec::<f32>().unwrap();

        assert_eq!(values.len(), INPUT_SIZE);
        assert_eq!(values[0], 1.0);
        assert!((values[1] - 0.2).abs() < 1e-6);
        assert!(values[2..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn batcher_flattens_rows_and_scales_once() {
        let device = Default::default();
        let batcher = MnistBatcher::<TestBackend>::new(device);

        let batch = batcher.batch(vec![item(127.5, 3), item(255.0, 7)]);

        assert_eq!(batch.images.dims(), [2, INPUT_SIZE]);
        let images = batch.images.into_data().to_vec::<f32>().unwrap();
        assert!((images[0] - 0.5).abs() < 1e-6);
        assert_eq!(images[1], 1.0);
        assert_eq!(images[INPUT_SIZE - 1], 0.0);
        assert_eq!(images[INPUT_SIZE], 1.0);
        assert!(images.iter().all(|v| (0.0..=1.0).contains(v)));

        let targets = batch.targets.into_data().convert::<i64>().to_vec::<i64>().unwrap();
        assert_eq!(targets, vec![3, 7]);
    }
}
