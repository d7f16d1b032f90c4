//! Engine factories for the ocrgate pipeline.
//!
//! The recognizer itself is an external program; this crate only knows how to
//! start it, hand it an image and read back located text.

pub mod languages;
pub mod tesseract;

pub use languages::to_tesseract_code;
pub use tesseract::{parse_tsv, TesseractEngine, TesseractFactory};
