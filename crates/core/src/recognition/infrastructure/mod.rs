pub mod in_memory_identity_store;
pub mod json_identity_store;
pub mod lbph_recognizer;
