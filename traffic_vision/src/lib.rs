// THEORY:
// This file is the main entry point for the `traffic_vision` library crate.
// It exposes the three stages of the traffic monitor as a public API that the
// `traffic_monitor` binary (or any other frontend) drives:
//
// 1.  **Frame analysis** (`core_modules::frame_analyzer`): turns one captured
//     BGR frame into a scalar `CongestionLevel` using edge density.
// 2.  **Decision** (`core_modules::traffic_optimizer`): maps that level onto one
//     of three fixed signal-timing recommendations.
// 3.  **Capture loop** (`capture_loop`): owns a video source and a display
//     surface, pulls frames one at a time, runs the two stages above and reports
//     the result.
//
// Image processing goes through OpenCV's `imgproc`, but nothing here depends
// on a particular capture backend. Video sources and display windows are
// traits, so the whole loop can be exercised with synthetic frames.

pub mod capture_loop;
pub mod config;
pub mod core_modules;
pub mod error;
