use burn::{prelude::*, train::ClassificationOutput};

/// Running mean of the batch losses seen since the last [clear](LossAccumulator::clear).
#[derive(Debug, Default, Clone)]
pub struct LossAccumulator {
    count: usize,
    total: f64,
}

impl LossAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update<B: Backend>(&mut self, loss: Tensor<B, 1>) {
        self.update_value(loss.into_scalar().elem::<f64>());
    }

    pub fn update_value(&mut self, loss: f64) {
        self.count += 1;
        self.total += loss;
    }

    /// Mean loss, zero when nothing has been accumulated.
    pub fn value(&self) -> f64 {
        match self.count {
            0 => 0.0,
            count => self.total / count as f64,
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn clear(&mut self) {
        self.count = 0;
        self.total = 0.0;
    }
}

/// Fraction of correctly classified samples since the last [clear](AccuracyAccumulator::clear).
#[derive(Debug, Default, Clone)]
pub struct AccuracyAccumulator {
    correct: usize,
    total: usize,
}

impl AccuracyAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts the rows of `output` whose highest score is the target class.
    pub fn update<B: Backend>(&mut self, output: Tensor<B, 2>, targets: Tensor<B, 1, Int>) {
        let [batch_size, _] = output.dims();
        let predictions = output.argmax(1).reshape([batch_size]);
        let correct = predictions
            .equal(targets)
            .int()
            .sum()
            .into_scalar()
            .elem::<i64>();

        self.update_counts(correct as usize, batch_size);
    }

    pub fn update_counts(&mut self, correct: usize, total: usize) {
        self.correct += correct;
        self.total += total;
    }

    /// Accuracy as a percentage, zero when nothing has been accumulated.
    pub fn value(&self) -> f64 {
        match self.total {
            0 => 0.0,
            total => self.correct as f64 / total as f64 * 100.0,
        }
    }

    pub fn clear(&mut self) {
        self.correct = 0;
        self.total = 0;
    }
}

/// Loss and accuracy of one dataset split, reset at the start of every pass over it.
#[derive(Debug, Default, Clone)]
pub struct SplitMetrics {
    pub loss: LossAccumulator,
    pub accuracy: AccuracyAccumulator,
}

impl SplitMetrics {
    pub fn update<B: Backend>(&mut self, item: ClassificationOutput<B>) {
        self.accuracy.update(item.output, item.targets);
        self.loss.update(item.loss);
    }

    pub fn clear(&mut self) {
        self.loss.clear();
        self.accuracy.clear();
    }
}
