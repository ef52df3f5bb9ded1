pub mod frame;
pub mod frame_analyzer;
pub mod traffic_optimizer;
