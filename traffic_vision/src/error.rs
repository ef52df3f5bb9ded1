use thiserror::Error;

/// Reasons a single frame could not be scored.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("frame has no pixels ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },

    #[error("frame buffer holds {actual} bytes, expected {expected} for {width}x{height} BGR")]
    MalformedFrame {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("frame dimensions {width}x{height} overflow the addressable buffer size")]
    FrameTooLarge { width: u32, height: u32 },

    #[error("OpenCV error: {0}")]
    OpenCv(String),
}

impl From<opencv::Error> for AnalysisError {
    fn from(e: opencv::Error) -> Self {
        AnalysisError::OpenCv(e.to_string())
    }
}

/// Failures raised by a video source, a display surface or the report sink.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("could not open video source {input}: {message}")]
    SourceUnavailable { input: String, message: String },

    #[error("failed to grab a frame: {0}")]
    Fetch(String),

    #[error("display error: {0}")]
    Display(String),

    #[error("failed to write report line: {0}")]
    Output(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Configuration error: {message}")]
    Invalid { message: String },
}
