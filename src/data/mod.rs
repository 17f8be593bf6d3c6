// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from an image-folder tree on disk to tensor
// batches on the training device:
//
//   <inputs_path>/<class>/*.jpg
//       │
//       ▼
//   ImageFolderLoader → (path, label) records, headers checked
//       │
//       ▼
//   split_train_val   → seeded shuffle, train / validation
//       │
//       ▼
//   FaceDataset       → Burn Dataset; decodes + resizes on get()
//       │
//       ▼
//   FaceBatcher       → standardises and stacks into tensors
//       │
//       ▼
//   DataLoader        → feeds batches to the training loop

/// Walks class directories and labels image files
pub mod loader;

/// Resizing and fixed image standardisation
pub mod preprocessor;

/// Implements Burn's Dataset trait for face samples
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Seeded shuffle and train/validation split
pub mod splitter;
