pub mod gaussian;
pub mod histogram;
pub mod morphology;
pub mod pixel_ops;
