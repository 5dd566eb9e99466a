use crate::data::{MnistBatch, INPUT_SIZE};
use burn::{
    nn::{
        loss::CrossEntropyLossConfig, BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear,
        LinearConfig, Relu,
    },
    prelude::*,
    tensor::{activation::softmax, backend::AutodiffBackend},
    train::{ClassificationOutput, TrainOutput, TrainStep, ValidStep},
};

/// Multilayer perceptron with two hidden layers.
///
/// The encoder is `(Linear -> BatchNorm -> Relu) * 2`, the decoder is
/// `Linear -> Dropout -> Softmax`.
///
/// Whether the model runs in training or inference mode depends on its backend: on an
/// autodiff backend batch norm normalizes with the statistics of the current batch (and
/// updates its running statistics) and dropout is active. The model returned by
/// [`AutodiffModule::valid`](burn::module::AutodiffModule::valid) normalizes with the
/// running statistics and never drops units.
#[derive(Module, Debug)]
pub struct Model<B: Backend> {
    encoder: Encoder<B>,
    decoder: Decoder<B>,
}

#[derive(Module, Debug)]
pub struct Encoder<B: Backend> {
    blocks: Vec<DenseBlock<B>>,
}

/// Affine transform followed by batch normalization and a ReLU.
#[derive(Module, Debug)]
pub struct DenseBlock<B: Backend> {
    linear: Linear<B>,
    norm: BatchNorm<B, 0>,
    activation: Relu,
}

#[derive(Module, Debug)]
pub struct Decoder<B: Backend> {
    linear: Linear<B>,
    dropout: Dropout,
}

#[derive(Config, Debug)]
pub struct ModelConfig {
    pub num_classes: usize,
    #[config(default = "INPUT_SIZE")]
    pub input_size: usize,
    #[config(default = 128)]
    pub hidden_size: usize,
    #[config(default = 32)]
    pub bottleneck_size: usize,
    #[config(default = 0.1)]
    pub dropout: f64,
}

impl ModelConfig {
    /// Returns the initialized model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Model<B> {
        let blocks = vec![
            DenseBlock::<B>::new(self.input_size, self.hidden_size, device),
            DenseBlock::<B>::new(self.hidden_size, self.bottleneck_size, device),
        ];

        Model {
            encoder: Encoder { blocks },
            decoder: Decoder {
                linear: LinearConfig::new(self.bottleneck_size, self.num_classes).init(device),
                dropout: DropoutConfig::new(self.dropout).init(),
            },
        }
    }
}

impl<B: Backend> DenseBlock<B> {
    fn new(d_input: usize, d_output: usize, device: &B::Device) -> Self {
        Self {
            linear: LinearConfig::new(d_input, d_output).init(device),
            norm: BatchNormConfig::new(d_output)
                .with_momentum(0.01)
                .with_epsilon(1e-3)
                .init(device),
            activation: Relu::new(),
        }
    }

    fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.linear.forward(input);
        let x = self.norm.forward(x);
        self.activation.forward(x)
    }
}

impl<B: Backend> Encoder<B> {
    fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        self.blocks
            .iter()
            .fold(input, |x, block| block.forward(x))
    }
}

impl<B: Backend> Decoder<B> {
    /// Class scores before the softmax.
    fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.linear.forward(input);
        self.dropout.forward(x)
    }
}

impl<B: Backend> Model<B> {
    /// Class probabilities for a batch of flattened images.
    ///
    /// # Shapes
    ///   - Images `[batch_size, input_size]`
    ///   - Output `[batch_size, num_classes]`
    pub fn forward(&self, images: Tensor<B, 2>) -> Tensor<B, 2> {
        softmax(self.forward_logits(images), 1)
    }

    /// Unnormalized class scores, the softmax input.
    pub fn forward_logits(&self, images: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.encoder.forward(images);
        self.decoder.forward(x)
    }

    pub fn forward_classification(&self, item: MnistBatch<B>) -> ClassificationOutput<B> {
        let targets = item.targets;
        let output = self.forward_logits(item.images);
        // Cross entropy on the logits equals the categorical cross entropy of the
        // softmax probabilities.
        let loss = CrossEntropyLossConfig::new()
            .init(&output.device())
            .forward(output.clone(), targets.clone());

        ClassificationOutput {
            loss,
            output,
            targets,
        }
    }
}

impl<B: AutodiffBackend> TrainStep<MnistBatch<B>, ClassificationOutput<B>> for Model<B> {
    fn step(&self, item: MnistBatch<B>) -> TrainOutput<ClassificationOutput<B>> {
        let item = self.forward_classification(item);

        TrainOutput::new(self, item.loss.backward(), item)
    }
}

impl<B: Backend> ValidStep<MnistBatch<B>, ClassificationOutput<B>> for Model<B> {
    fn step(&self, item: MnistBatch<B>) -> ClassificationOutput<B> {
        self.forward_classification(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{data::NUM_CLASSES, TestAutodiffBackend, TestBackend};
    use burn::module::AutodiffModule;

    fn images<B: Backend>(batch_size: usize, device: &B::Device) -> Tensor<B, 2> {
        let values = (0..batch_size * INPUT_SIZE)
            .map(|i| ((i * 37) % 256) as f32 / 255.0)
            .collect::<Vec<_>>();
        Tensor::from_data(TensorData::new(values, [batch_size, INPUT_SIZE]), device)
    }

    #[test]
    fn running_mean_moves_by_one_percent_of_the_batch_mean() {
        let device = Default::default();
        let block = DenseBlock::<TestAutodiffBackend>::new(4, 3, &device);
        let input = Tensor::<TestAutodiffBackend, 2>::from_floats(
            [[0.9601, 0.7277, 0.1270, 0.5441], [0.6272, 0.9034, 0.4066, 0.7179]],
            &device,
        );
        let batch_mean = block
            .linear
            .forward(input.clone())
            .mean_dim(0)
            .reshape([3])
            .into_data();

        block.forward(input);

        let expected = batch_mean
            .to_vec::<f32>()
            .unwrap()
            .into_iter()
            .map(|mean| mean * 0.01)
            .collect::<Vec<_>>();
        block
            .norm
            .running_mean
            .value_sync()
            .into_data()
            .assert_approx_eq(&TensorData::new(expected, [3]), 4);
    }

    #[test]
    fn forward_outputs_a_distribution_per_row() {
        let device = Default::default();
        let model = ModelConfig::new(NUM_CLASSES).init::<TestBackend>(&device);

        let output = model.forward(images::<TestBackend>(4, &device));

        assert_eq!(output.dims(), [4, NUM_CLASSES]);
        let sums = output.sum_dim(1).into_data().to_vec::<f32>().unwrap();
        for sum in sums {
            assert!((sum - 1.0).abs() < 1e-4, "row sums to {sum}");
        }
    }

    #[test]
    fn inference_mode_is_deterministic() {
        let device = Default::default();
        let model = ModelConfig::new(NUM_CLASSES).init::<TestAutodiffBackend>(&device);
        // A training forward pass moves the running statistics away from their initial values.
        model.forward(images::<TestAutodiffBackend>(8, &device));
        let model = model.valid();

        let first = model.forward(images::<TestBackend>(3, &device)).into_data();
        let second = model.forward(images::<TestBackend>(3, &device)).into_data();

        first.assert_eq(&second, true);
    }

    #[test]
    fn training_forward_updates_running_statistics() {
        let device = Default::default();
        let model = ModelConfig::new(NUM_CLASSES).init::<TestAutodiffBackend>(&device);
        let before = model.valid().forward(images::<TestBackend>(2, &device)).into_data();

        model.forward(images::<TestAutodiffBackend>(8, &device));
        let after = model.valid().forward(images::<TestBackend>(2, &device)).into_data();

        assert_ne!(
            before.to_vec::<f32>().unwrap(),
            after.to_vec::<f32>().unwrap()
        );
    }

    #[test]
    fn training_mode_drops_units() {
        let device = Default::default();
        let model = ModelConfig::new(NUM_CLASSES)
            .with_dropout(0.9)
            .init::<TestAutodiffBackend>(&device);

        let logits = model
            .forward_logits(images::<TestAutodiffBackend>(16, &device))
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        let zeros = logits.iter().filter(|v| **v == 0.0).count();

        assert!(zeros > 0, "no unit was dropped out of {}", logits.len());
    }

    #[test]
    fn classification_loss_is_positive() {
        let device = Default::default();
        let model = ModelConfig::new(NUM_CLASSES).init::<TestBackend>(&device);
        let targets = Tensor::<TestBackend, 1, Int>::from_ints([0, 3, 9], &device);

        let output = model.forward_classification(MnistBatch {
            images: images::<TestBackend>(3, &device),
            targets,
        });

        assert_eq!(output.output.dims(), [3, NUM_CLASSES]);
        let loss = output.loss.into_scalar().elem::<f32>();
        assert!(loss.is_finite() && loss > 0.0);
    }
}
