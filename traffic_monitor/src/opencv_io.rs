// OpenCV-backed implementations of the capture loop's source and display.

use opencv::{
    core::Mat,
    highgui,
    prelude::*,
    videoio::{self, VideoCapture},
};
use tracing::{info, warn};
use traffic_vision::capture_loop::{DisplaySurface, FrameSource};
use traffic_vision::config::VideoInput;
use traffic_vision::core_modules::frame::Frame;
use traffic_vision::error::CaptureError;

fn fetch_error(e: opencv::Error) -> CaptureError {
    CaptureError::Fetch(e.to_string())
}

fn display_error(e: opencv::Error) -> CaptureError {
    CaptureError::Display(e.to_string())
}

/// A camera or video file opened through `videoio`.
pub struct OpenCvCapture {
    cap: VideoCapture,
    frame: Mat,
}

impl OpenCvCapture {
    pub fn open(input: &VideoInput) -> Result<Self, CaptureError> {
        let unavailable = |message: String| CaptureError::SourceUnavailable {
            input: input.to_string(),
            message,
        };

        let cap = match input {
            VideoInput::Device(index) => VideoCapture::new(*index, videoio::CAP_ANY),
            VideoInput::File(path) => {
                let path = path
                    .to_str()
                    .ok_or_else(|| unavailable("path is not valid UTF-8".to_string()))?;
                VideoCapture::from_file(path, videoio::CAP_ANY)
            }
        }
        .map_err(|e| unavailable(e.to_string()))?;

        if !cap.is_opened().map_err(|e| unavailable(e.to_string()))? {
            return Err(unavailable("stream did not open".to_string()));
        }

        let width = cap.get(videoio::CAP_PROP_FRAME_WIDTH).unwrap_or(0.0);
        let height = cap.get(videoio::CAP_PROP_FRAME_HEIGHT).unwrap_or(0.0);
        let fps = cap.get(videoio::CAP_PROP_FPS).unwrap_or(0.0);
        info!(%input, width, height, fps, "Video source opened");

        Ok(Self {
            cap,
            frame: Mat::default(),
        })
    }
}

impl FrameSource for OpenCvCapture {
    fn read_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        let grabbed = self.cap.read(&mut self.frame).map_err(fetch_error)?;
        if !grabbed || self.frame.empty() {
            return Ok(None);
        }

        let size = self.frame.size().map_err(fetch_error)?;
        let data = if self.frame.is_continuous() {
            self.frame.data_bytes().map_err(fetch_error)?.to_vec()
        } else {
            // Row padding: copy into a packed matrix first.
            let packed = self.frame.try_clone().map_err(fetch_error)?;
            packed.data_bytes().map_err(fetch_error)?.to_vec()
        };

        // Non-BGR frames are passed through; the analyzer rejects them as malformed.
        Ok(Some(Frame::new(size.width as u32, size.height as u32, data)))
    }
}

impl Drop for OpenCvCapture {
    fn drop(&mut self) {
        match self.cap.release() {
            Ok(()) => info!("Video source released"),
            Err(e) => warn!(error = %e, "Failed to release video source"),
        }
    }
}

/// A `highgui` window that also serves as the stop-key poller.
pub struct HighGuiWindow {
    title: String,
    stop_key: i32,
}

impl HighGuiWindow {
    pub fn open(title: &str, stop_key: char) -> Result<Self, CaptureError> {
        highgui::named_window(title, highgui::WINDOW_AUTOSIZE).map_err(display_error)?;
        Ok(Self {
            title: title.to_string(),
            stop_key: stop_key as i32,
        })
    }
}

impl DisplaySurface for HighGuiWindow {
    fn show(&mut self, frame: &Frame) -> Result<(), CaptureError> {
        let image = frame
            .to_mat()
            .map_err(|e| CaptureError::Display(e.to_string()))?;
        highgui::imshow(&self.title, &image).map_err(display_error)
    }

    fn stop_requested(&mut self) -> Result<bool, CaptureError> {
        let key = highgui::wait_key(1).map_err(display_error)?;
        Ok(key != -1 && (key & 0xFF) == self.stop_key)
    }
}

impl Drop for HighGuiWindow {
    fn drop(&mut self) {
        if let Err(e) = highgui::destroy_all_windows() {
            warn!(error = %e, "Failed to close display windows");
        }
    }
}
