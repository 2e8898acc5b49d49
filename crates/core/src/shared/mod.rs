pub mod annotate;
pub mod atomic_file;
pub mod constants;
pub mod frame;
pub mod model_resolver;
pub mod rect;
pub mod video_metadata;
