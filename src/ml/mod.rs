// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// Everything that builds, trains or observes the network.
//
//   model.rs        — InceptionResnetV1 as Burn modules
//                     • stem convolutions
//                     • Block35 / Block17 / Block8 residual stages
//                     • 512-d embedding with optional logits head
//
//   provisioner.rs  — Where the model comes from: a checkpoint,
//                     or a (pretrained) backbone, frozen, with
//                     its head replaced by a pass-through
//
//   callbacks.rs    — Lifecycle observers: checkpoint + metrics
//                     CSV, and TensorBoard scalars
//
//   trainer.rs      — The fit loop: forward, loss, backward,
//                     Adam step, evaluation, event dispatch
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Szegedy et al. (2016) Inception-v4, Inception-ResNet
//            Schroff et al. (2015) FaceNet

/// InceptionResnetV1 face-embedding network
pub mod model;

/// Checkpoint / pretrained / fresh model construction
pub mod provisioner;

/// Callback registry and the built-in observers
pub mod callbacks;

/// Training loop with validation and checkpoint events
pub mod trainer;
