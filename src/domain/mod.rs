// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs, enums and traits that describe what a
// training run IS, independent of how it is executed.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// The lifecycle types are generic over the model type `M`
// so observers can be written and tested without a GPU.

// Training lifecycle states, events and epoch summaries
pub mod lifecycle;

// Class-name ↔ label mapping for image-folder datasets
pub mod classes;

// Core abstractions (traits) that other layers implement
pub mod traits;
