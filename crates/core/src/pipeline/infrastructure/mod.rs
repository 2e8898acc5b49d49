pub mod frame_feeder;
