// ============================================================
// Layer 5 — InceptionResnetV1
// ============================================================
// The face-embedding backbone (Szegedy et al. 2016, as trained
// by facenet on casia-webface), expressed as Burn modules.
//
// Field names mirror the facenet-pytorch state dict
// (`conv2d_1a.conv.weight`, `repeat_1.0.branch1.1.bn.running_var`,
// ...) so pretrained weights load without key remapping.
//
//   stem:    conv2d_1a … conv2d_4b            [N, 256, h, w]
//   repeat_1 Block35 ×5  (scale 0.17)
//   mixed_6a                                  [N, 896, ..]
//   repeat_2 Block17 ×10 (scale 0.10)
//   mixed_7a                                  [N, 1792, ..]
//   repeat_3 Block8 ×5   (scale 0.20), block8 (no ReLU)
//   avgpool → dropout → last_linear → last_bn [N, 512]
//   logits (optional head)                    [N, classes]
//
// With `logits = None` the head is a pass-through and the
// forward pass returns L2-normalised 512-d embeddings.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig,
        Dropout, DropoutConfig,
        Linear, LinearConfig,
        PaddingConfig2d, Relu,
    },
    prelude::*,
    tensor::activation::relu,
};

/// Identities in the casia-webface training set (size of its logits head)
pub const CASIA_WEBFACE_CLASSES: usize = 10575;

/// Smallest square input that survives every stride in the network
pub const MIN_IMAGE_SIZE: usize = 75;

const BN_EPSILON:  f64 = 1e-3;
const BN_MOMENTUM: f64 = 0.1;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct InceptionResnetV1Config {
    #[config(default = 5)]
    pub block35_repeats: usize,
    #[config(default = 10)]
    pub block17_repeats: usize,
    #[config(default = 5)]
    pub block8_repeats:  usize,
    #[config(default = 512)]
    pub embedding_dim:   usize,
    #[config(default = 0.6)]
    pub dropout:         f64,
    /// Classification head width; `None` means pass-through
    pub num_classes:     Option<usize>,
}

impl InceptionResnetV1Config {
    /// Width of the forward-pass output.
    pub fn output_dim(&self) -> usize {
        self.num_classes.unwrap_or(self.embedding_dim)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> InceptionResnetV1<B> {
        InceptionResnetV1 {
            conv2d_1a:  basic_conv(device, 3, 32, [3, 3], 2, [0, 0]),
            conv2d_2a:  basic_conv(device, 32, 32, [3, 3], 1, [0, 0]),
            conv2d_2b:  basic_conv(device, 32, 64, [3, 3], 1, [1, 1]),
            maxpool_3a: max_pool(),
            conv2d_3b:  basic_conv(device, 64, 80, [1, 1], 1, [0, 0]),
            conv2d_4a:  basic_conv(device, 80, 192, [3, 3], 1, [0, 0]),
            conv2d_4b:  basic_conv(device, 192, 256, [3, 3], 2, [0, 0]),
            repeat_1:   (0..self.block35_repeats).map(|_| Block35::new(device, 0.17)).collect(),
            mixed_6a:   Mixed6a::new(device),
            repeat_2:   (0..self.block17_repeats).map(|_| Block17::new(device, 0.10)).collect(),
            mixed_7a:   Mixed7a::new(device),
            repeat_3:   (0..self.block8_repeats).map(|_| Block8::new(device, 0.20, true)).collect(),
            block8:     Block8::new(device, 1.0, false),
            avgpool_1a: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            dropout:    DropoutConfig::new(self.dropout).init(),
            last_linear: LinearConfig::new(1792, self.embedding_dim)
                .with_bias(false)
                .init(device),
            last_bn:    batch_norm(device, self.embedding_dim),
            logits:     self
                .num_classes
                .map(|n| LinearConfig::new(self.embedding_dim, n).init(device)),
        }
    }
}

fn basic_conv<B: Backend>(
    device:  &B::Device,
    input:   usize,
    output:  usize,
    kernel:  [usize; 2],
    stride:  usize,
    padding: [usize; 2],
) -> BasicConv2d<B> {
    let conv = Conv2dConfig::new([input, output], kernel)
        .with_stride([stride, stride])
        .with_padding(PaddingConfig2d::Explicit(padding[0], padding[1]))
        .with_bias(false)
        .init(device);
    BasicConv2d { conv, bn: batch_norm(device, output) }
}

fn batch_norm<B: Backend, const D: usize>(device: &B::Device, features: usize) -> BatchNorm<B, D> {
    BatchNormConfig::new(features)
        .with_epsilon(BN_EPSILON)
        .with_momentum(BN_MOMENTUM)
        .init(device)
}

/// 1×1 projection back to the residual width, with bias.
fn up_projection<B: Backend>(device: &B::Device, input: usize, output: usize) -> Conv2d<B> {
    Conv2dConfig::new([input, output], [1, 1]).init(device)
}

fn max_pool() -> MaxPool2d {
    MaxPool2dConfig::new([3, 3]).with_strides([2, 2]).init()
}

fn forward_seq<B: Backend>(layers: &[BasicConv2d<B>], x: Tensor<B, 4>) -> Tensor<B, 4> {
    layers.iter().fold(x, |x, layer| layer.forward(x))
}

// ─── BasicConv2d ──────────────────────────────────────────────────────────────
/// conv (no bias) → batch norm → ReLU
#[derive(Module, Debug)]
pub struct BasicConv2d<B: Backend> {
    pub conv: Conv2d<B>,
    pub bn:   BatchNorm<B, 2>,
}

impl<B: Backend> BasicConv2d<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        relu(self.bn.forward(self.conv.forward(x)))
    }
}

// ─── Block35 (35×35 grid in the paper) ────────────────────────────────────────
#[derive(Module, Debug)]
pub struct Block35<B: Backend> {
    pub branch0: BasicConv2d<B>,
    pub branch1: Vec<BasicConv2d<B>>,
    pub branch2: Vec<BasicConv2d<B>>,
    pub conv2d:  Conv2d<B>,
    pub scale:   f64,
}

impl<B: Backend> Block35<B> {
    fn new(device: &B::Device, scale: f64) -> Self {
        Self {
            branch0: basic_conv(device, 256, 32, [1, 1], 1, [0, 0]),
            branch1: vec![
                basic_conv(device, 256, 32, [1, 1], 1, [0, 0]),
                basic_conv(device, 32, 32, [3, 3], 1, [1, 1]),
            ],
            branch2: vec![
                basic_conv(device, 256, 32, [1, 1], 1, [0, 0]),
                basic_conv(device, 32, 32, [3, 3], 1, [1, 1]),
                basic_conv(device, 32, 32, [3, 3], 1, [1, 1]),
            ],
            conv2d: up_projection(device, 96, 256),
            scale,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x0  = self.branch0.forward(x.clone());
        let x1  = forward_seq(&self.branch1, x.clone());
        let x2  = forward_seq(&self.branch2, x.clone());
        let out = self.conv2d.forward(Tensor::cat(vec![x0, x1, x2], 1));
        relu(out * self.scale + x)
    }
}

// ─── Mixed6a (reduction 256 → 896) ────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct Mixed6a<B: Backend> {
    pub branch0: BasicConv2d<B>,
    pub branch1: Vec<BasicConv2d<B>>,
    pub branch2: MaxPool2d,
}

impl<B: Backend> Mixed6a<B> {
    fn new(device: &B::Device) -> Self {
        Self {
            branch0: basic_conv(device, 256, 384, [3, 3], 2, [0, 0]),
            branch1: vec![
                basic_conv(device, 256, 192, [1, 1], 1, [0, 0]),
                basic_conv(device, 192, 192, [3, 3], 1, [1, 1]),
                basic_conv(device, 192, 256, [3, 3], 2, [0, 0]),
            ],
            branch2: max_pool(),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x0 = self.branch0.forward(x.clone());
        let x1 = forward_seq(&self.branch1, x.clone());
        let x2 = self.branch2.forward(x);
        Tensor::cat(vec![x0, x1, x2], 1)
    }
}

// ─── Block17 (17×17 grid) ─────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct Block17<B: Backend> {
    pub branch0: BasicConv2d<B>,
    pub branch1: Vec<BasicConv2d<B>>,
    pub conv2d:  Conv2d<B>,
    pub scale:   f64,
}

impl<B: Backend> Block17<B> {
    fn new(device: &B::Device, scale: f64) -> Self {
        Self {
            branch0: basic_conv(device, 896, 128, [1, 1], 1, [0, 0]),
            branch1: vec![
                basic_conv(device, 896, 128, [1, 1], 1, [0, 0]),
                basic_conv(device, 128, 128, [1, 7], 1, [0, 3]),
                basic_conv(device, 128, 128, [7, 1], 1, [3, 0]),
            ],
            conv2d: up_projection(device, 256, 896),
            scale,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x0  = self.branch0.forward(x.clone());
        let x1  = forward_seq(&self.branch1, x.clone());
        let out = self.conv2d.forward(Tensor::cat(vec![x0, x1], 1));
        relu(out * self.scale + x)
    }
}

// ─── Mixed7a (reduction 896 → 1792) ───────────────────────────────────────────
#[derive(Module, Debug)]
pub struct Mixed7a<B: Backend> {
    pub branch0: Vec<BasicConv2d<B>>,
    pub branch1: Vec<BasicConv2d<B>>,
    pub branch2: Vec<BasicConv2d<B>>,
    pub branch3: MaxPool2d,
}

impl<B: Backend> Mixed7a<B> {
    fn new(device: &B::Device) -> Self {
        Self {
            branch0: vec![
                basic_conv(device, 896, 256, [1, 1], 1, [0, 0]),
                basic_conv(device, 256, 384, [3, 3], 2, [0, 0]),
            ],
            branch1: vec![
                basic_conv(device, 896, 256, [1, 1], 1, [0, 0]),
                basic_conv(device, 256, 256, [3, 3], 2, [0, 0]),
            ],
            branch2: vec![
                basic_conv(device, 896, 256, [1, 1], 1, [0, 0]),
                basic_conv(device, 256, 256, [3, 3], 1, [1, 1]),
                basic_conv(device, 256, 256, [3, 3], 2, [0, 0]),
            ],
            branch3: max_pool(),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x0 = forward_seq(&self.branch0, x.clone());
        let x1 = forward_seq(&self.branch1, x.clone());
        let x2 = forward_seq(&self.branch2, x.clone());
        let x3 = self.branch3.forward(x);
        Tensor::cat(vec![x0, x1, x2, x3], 1)
    }
}

// ─── Block8 (8×8 grid) ────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct Block8<B: Backend> {
    pub branch0: BasicConv2d<B>,
    pub branch1: Vec<BasicConv2d<B>>,
    pub conv2d:  Conv2d<B>,
    pub scale:   f64,
    /// The final Block8 skips its activation
    pub relu:    Option<Relu>,
}

impl<B: Backend> Block8<B> {
    fn new(device: &B::Device, scale: f64, activate: bool) -> Self {
        Self {
            branch0: basic_conv(device, 1792, 192, [1, 1], 1, [0, 0]),
            branch1: vec![
                basic_conv(device, 1792, 192, [1, 1], 1, [0, 0]),
                basic_conv(device, 192, 192, [1, 3], 1, [0, 1]),
                basic_conv(device, 192, 192, [3, 1], 1, [1, 0]),
            ],
            conv2d: up_projection(device, 384, 1792),
            scale,
            relu: activate.then(Relu::new),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x0  = self.branch0.forward(x.clone());
        let x1  = forward_seq(&self.branch1, x.clone());
        let out = self.conv2d.forward(Tensor::cat(vec![x0, x1], 1)) * self.scale + x;
        match &self.relu {
            Some(act) => act.forward(out),
            None      => out,
        }
    }
}

// ─── InceptionResnetV1 ────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct InceptionResnetV1<B: Backend> {
    pub conv2d_1a:   BasicConv2d<B>,
    pub conv2d_2a:   BasicConv2d<B>,
    pub conv2d_2b:   BasicConv2d<B>,
    pub maxpool_3a:  MaxPool2d,
    pub conv2d_3b:   BasicConv2d<B>,
    pub conv2d_4a:   BasicConv2d<B>,
    pub conv2d_4b:   BasicConv2d<B>,
    pub repeat_1:    Vec<Block35<B>>,
    pub mixed_6a:    Mixed6a<B>,
    pub repeat_2:    Vec<Block17<B>>,
    pub mixed_7a:    Mixed7a<B>,
    pub repeat_3:    Vec<Block8<B>>,
    pub block8:      Block8<B>,
    pub avgpool_1a:  AdaptiveAvgPool2d,
    pub dropout:     Dropout,
    pub last_linear: Linear<B>,
    pub last_bn:     BatchNorm<B, 0>,
    pub logits:      Option<Linear<B>>,
}

impl<B: Backend> InceptionResnetV1<B> {
    /// images: [batch, 3, H, W] → [batch, embedding_dim] (before the head)
    pub fn embed(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.conv2d_1a.forward(images);
        let x = self.conv2d_2a.forward(x);
        let x = self.conv2d_2b.forward(x);
        let x = self.maxpool_3a.forward(x);
        let x = self.conv2d_3b.forward(x);
        let x = self.conv2d_4a.forward(x);
        let x = self.conv2d_4b.forward(x);
        let x = self.repeat_1.iter().fold(x, |x, block| block.forward(x));
        let x = self.mixed_6a.forward(x);
        let x = self.repeat_2.iter().fold(x, |x, block| block.forward(x));
        let x = self.mixed_7a.forward(x);
        let x = self.repeat_3.iter().fold(x, |x, block| block.forward(x));
        let x = self.block8.forward(x);
        let x = self.avgpool_1a.forward(x);
        let x = self.dropout.forward(x);

        let [batch, channels, _, _] = x.dims();
        let x = self.last_linear.forward(x.reshape([batch, channels]));
        self.last_bn.forward(x)
    }

    /// Class logits when a head is attached, otherwise unit-length embeddings.
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.embed(images);
        match &self.logits {
            Some(head) => head.forward(x),
            None       => l2_normalize(x),
        }
    }

    /// Mark every parameter as non-trainable.
    pub fn freeze(self) -> Self {
        self.no_grad()
    }

    /// Swap the classification head; `None` turns it into a pass-through.
    pub fn with_head(mut self, head: Option<Linear<B>>) -> Self {
        self.logits = head;
        self
    }

    #[cfg(test)]
    pub fn has_head(&self) -> bool {
        self.logits.is_some()
    }
}

/// Row-wise L2 normalisation of `[batch, dim]`.
pub fn l2_normalize<B: Backend>(x: Tensor<B, 2>) -> Tensor<B, 2> {
    let norm = x.clone().powf_scalar(2.0).sum_dim(1).sqrt().clamp_min(1e-12);
    x / norm
}

// ─── ImageClassifier ──────────────────────────────────────────────────────────
/// What the training loop needs from a model: images in, scores out.
pub trait ImageClassifier<B: Backend> {
    /// images: [batch, 3, H, W] → scores: [batch, classes]
    fn classify(&self, images: Tensor<B, 4>) -> Tensor<B, 2>;
}

impl<B: Backend> ImageClassifier<B> for InceptionResnetV1<B> {
    fn classify(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        self.forward(images)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = NdArray;
    type TestAutodiffBackend = Autodiff<NdArray>;

    /// One block per stage keeps tests fast; widths are unchanged.
    pub(crate) fn tiny_config() -> InceptionResnetV1Config {
        InceptionResnetV1Config::new()
            .with_block35_repeats(1)
            .with_block17_repeats(1)
            .with_block8_repeats(1)
    }

    /// Sample of parameters spread across every stage of the network.
    pub(crate) fn sampled_params_require_grad<B: Backend>(model: &InceptionResnetV1<B>) -> Vec<bool> {
        vec![
            model.conv2d_1a.conv.weight.val().is_require_grad(),
            model.conv2d_1a.bn.gamma.val().is_require_grad(),
            model.conv2d_4b.conv.weight.val().is_require_grad(),
            model.repeat_1[0].conv2d.weight.val().is_require_grad(),
            model.mixed_6a.branch0.conv.weight.val().is_require_grad(),
            model.repeat_2[0].branch1[2].conv.weight.val().is_require_grad(),
            model.mixed_7a.branch2[1].bn.beta.val().is_require_grad(),
            model.block8.conv2d.weight.val().is_require_grad(),
            model.last_linear.weight.val().is_require_grad(),
            model.last_bn.gamma.val().is_require_grad(),
        ]
    }

    #[test]
    fn test_embedding_shape_and_norm() {
        let device = Default::default();
        let model: InceptionResnetV1<TestBackend> = tiny_config().init(&device);
        let images = Tensor::<TestBackend, 4>::random(
            [2, 3, 80, 80],
            burn::tensor::Distribution::Uniform(-1.0, 1.0),
            &device,
        );

        let out = model.forward(images);
        assert_eq!(out.dims(), [2, 512]);

        let norms: Vec<f32> = out.powf_scalar(2.0).sum_dim(1).sqrt().into_data().iter::<f32>().collect();
        for n in norms {
            assert!((n - 1.0).abs() < 1e-3, "norm was {n}");
        }
    }

    #[test]
    fn test_head_changes_output_width() {
        let device = Default::default();
        let model: InceptionResnetV1<TestBackend> = tiny_config().with_num_classes(Some(7)).init(&device);
        assert!(model.has_head());

        let images = Tensor::<TestBackend, 4>::zeros([1, 3, 75, 75], &device);
        assert_eq!(model.forward(images).dims(), [1, 7]);
    }

    #[test]
    fn test_output_dim_follows_head() {
        assert_eq!(InceptionResnetV1Config::new().output_dim(), 512);
        assert_eq!(InceptionResnetV1Config::new().with_num_classes(Some(CASIA_WEBFACE_CLASSES)).output_dim(), CASIA_WEBFACE_CLASSES);
    }

    #[test]
    fn test_freeze_marks_params_non_trainable() {
        let device = Default::default();
        let model: InceptionResnetV1<TestAutodiffBackend> = tiny_config().init(&device);
        assert!(sampled_params_require_grad(&model).iter().all(|&g| g));

        let frozen = model.freeze();
        assert!(sampled_params_require_grad(&frozen).iter().all(|&g| !g));
    }

    #[test]
    fn test_with_head_none_is_pass_through() {
        let device = Default::default();
        let model: InceptionResnetV1<TestBackend> = tiny_config().with_num_classes(Some(3)).init(&device);
        let model = model.with_head(None);
        assert!(!model.has_head());
    }
}
