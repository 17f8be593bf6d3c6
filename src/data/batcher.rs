// ============================================================
// Layer 4 — Face Batcher
// ============================================================
// Implements Burn's Batcher trait to stack FaceSamples into
// device tensors.
//
//   Input:  Vec of N FaceSamples, each S×S×3 bytes (HWC)
//   Output: FaceBatch { images: [N, 3, S, S], targets: [N] }
//
// Every sample is already resized to the same S by the
// preprocessor, so batching is a flatten + reshape. Samples whose
// image could not be decoded are dropped, so a batch may come
// out smaller than requested (or empty).

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::{
    dataset::FaceSample,
    preprocessor::{hwc_to_chw, CHANNELS},
};

/// A batch of faces ready for the forward pass.
#[derive(Debug, Clone)]
pub struct FaceBatch<B: Backend> {
    /// Standardised images, shape: [batch_size, 3, size, size]
    pub images: Tensor<B, 4>,

    /// Class labels, shape: [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

#[derive(Clone, Debug)]
pub struct FaceBatcher<B: Backend> {
    device:     B::Device,
    image_size: usize,
}

impl<B: Backend> FaceBatcher<B> {
    pub fn new(device: B::Device, image_size: usize) -> Self {
        Self { device, image_size }
    }
}

impl<B: Backend> Batcher<FaceSample, FaceBatch<B>> for FaceBatcher<B> {
    fn batch(&self, items: Vec<FaceSample>) -> FaceBatch<B> {
        let size     = self.image_size;
        let expected = size * size * CHANNELS;

        let requested = items.len();
        let items: Vec<FaceSample> = items
            .into_iter()
            .filter(|s| s.pixels.len() == expected)
            .collect();
        if items.len() < requested {
            tracing::debug!("Dropped {} unreadable images from batch", requested - items.len());
        }
        let batch_size = items.len();

        let pixels: Vec<f32> = items
            .iter()
            .flat_map(|s| hwc_to_chw(&s.pixels, size))
            .collect();

        let labels: Vec<i32> = items
            .iter()
            .map(|s| s.label as i32)
            .collect();

        let images = Tensor::<B, 1>::from_floats(pixels.as_slice(), &self.device)
            .reshape([batch_size, CHANNELS, size, size]);

        let targets = Tensor::<B, 1, Int>::from_ints(labels.as_slice(), &self.device);

        FaceBatch { images, targets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_batch_shapes() {
        let batcher = FaceBatcher::<NdArray>::new(Default::default(), 4);
        let items = vec![
            FaceSample::new(vec![255; 4 * 4 * 3], 1),
            FaceSample::new(vec![0;   4 * 4 * 3], 0),
        ];
        let batch = batcher.batch(items);

        assert_eq!(batch.images.dims(), [2, 3, 4, 4]);
        assert_eq!(batch.targets.dims(), [2]);

        let targets: Vec<i64> = batch.targets.into_data().iter::<i64>().collect();
        assert_eq!(targets, vec![1, 0]);
    }

    #[test]
    fn test_unreadable_samples_are_dropped() {
        let batcher = FaceBatcher::<NdArray>::new(Default::default(), 4);
        let items = vec![
            FaceSample::unreadable(3),
            FaceSample::new(vec![10; 4 * 4 * 3], 2),
        ];
        let batch = batcher.batch(items);

        assert_eq!(batch.images.dims(), [1, 3, 4, 4]);
        let targets: Vec<i64> = batch.targets.into_data().iter::<i64>().collect();
        assert_eq!(targets, vec![2]);

        let empty = batcher.batch(vec![FaceSample::unreadable(0)]);
        assert_eq!(empty.targets.dims(), [0]);
    }
}
