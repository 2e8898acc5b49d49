pub mod face_recognizer;
pub mod identity_store;
