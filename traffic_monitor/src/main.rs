mod logger;
mod opencv_io;

use anyhow::{Context, Result};
use opencv_io::{HighGuiWindow, OpenCvCapture};
use std::io;
use tracing::{error, info};
use traffic_vision::capture_loop::CaptureLoop;
use traffic_vision::config::MonitorConfig;

fn main() -> Result<()> {
    // --- 1. Configuration & Logging ---
    let config = MonitorConfig::from_env().context("failed to load monitor configuration")?;
    logger::init(&config.logging.level);
    info!(input = %config.source.input, "Traffic monitor starting");

    // --- 2. Video Source ---
    let capture = match OpenCvCapture::open(&config.source.input) {
        Ok(capture) => capture,
        Err(e) => {
            error!(error = %e, "Could not open video stream or file");
            return Ok(());
        }
    };

    // --- 3. Display Window ---
    let window = match HighGuiWindow::open(&config.capture.window_title, config.capture.stop_key) {
        Ok(window) => window,
        Err(e) => {
            error!(error = %e, "Could not create display window");
            return Ok(());
        }
    };

    info!(
        "Monitoring traffic. Press '{}' in the window to stop.",
        config.capture.stop_key
    );

    // --- 4. Main Processing Loop ---
    // Source and window are released when the loop returns.
    CaptureLoop::new(capture, window, io::stdout(), &config.loop_settings()).run();

    Ok(())
}
