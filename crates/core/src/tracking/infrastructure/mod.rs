pub mod mosse_tracker;
