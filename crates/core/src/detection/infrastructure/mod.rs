pub mod execution_provider;
pub mod math;
pub mod onnx_face_detector;
pub mod onnx_hand_detector;
pub mod yolo;
