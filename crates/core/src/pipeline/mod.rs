pub mod infrastructure;
pub mod pipeline_config;
pub mod pipeline_logger;
pub mod recognition_pipeline;
pub mod recognition_service;
