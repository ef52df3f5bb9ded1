// THEORY:
// The `Frame` module is the unit of data that flows through the whole monitor.
// It is a "dumb" container for one captured image: 8-bit samples, three
// channels, interleaved in BGR order (the order camera and video backends hand
// frames over in).
//
// Key architectural principles:
// 1.  **Unchecked Construction**: A `Frame` is built straight from whatever the
//     capture backend produced. It does not reject short buffers or zero sizes;
//     a malformed frame has to reach the analyzer so that it can be reported and
//     skipped as a per-frame failure instead of ending the capture loop.
// 2.  **Validation On Demand**: `validate` describes what a well-formed frame
//     looks like, and `to_mat` refuses to build an OpenCV matrix from anything
//     else.

use crate::error::AnalysisError;
use opencv::core::{CV_8UC3, Mat, Scalar};
use opencv::prelude::*;

/// Number of interleaved samples per pixel (blue, green, red).
pub const CHANNELS: usize = 3;

/// A single captured image in interleaved BGR order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The width of the image in pixels.
    pub width: u32,
    /// The height of the image in pixels.
    pub height: u32,
    /// Row-major pixel data, `CHANNELS` bytes per pixel.
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    /// Builds a frame by evaluating `pixel(x, y)` for every position.
    /// The closure returns `[blue, green, red]`.
    pub fn from_fn<F>(width: u32, height: u32, mut pixel: F) -> Self
    where
        F: FnMut(u32, u32) -> [u8; CHANNELS],
    {
        let mut data = Vec::with_capacity(width as usize * height as usize * CHANNELS);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&pixel(x, y));
            }
        }
        Self::new(width, height, data)
    }

    /// A frame where every pixel has the same BGR value.
    pub fn filled(width: u32, height: u32, bgr: [u8; CHANNELS]) -> Self {
        Self::from_fn(width, height, |_, _| bgr)
    }

    /// The buffer length a well-formed frame of this size must have.
    pub fn expected_len(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(CHANNELS)
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.width == 0 || self.height == 0 {
            return Err(AnalysisError::EmptyFrame {
                width: self.width,
                height: self.height,
            });
        }
        let expected = self.expected_len().ok_or(self.too_large())?;
        if self.data.len() != expected {
            return Err(AnalysisError::MalformedFrame {
                width: self.width,
                height: self.height,
                expected,
                actual: self.data.len(),
            });
        }
        Ok(())
    }

    /// Copies the frame into a `CV_8UC3` matrix.
    pub fn to_mat(&self) -> Result<Mat, AnalysisError> {
        self.validate()?;
        let rows = i32::try_from(self.height).map_err(|_| self.too_large())?;
        let cols = i32::try_from(self.width).map_err(|_| self.too_large())?;

        let mut mat = Mat::new_rows_cols_with_default(rows, cols, CV_8UC3, Scalar::all(0.0))?;
        mat.data_bytes_mut()?.copy_from_slice(&self.data);
        Ok(mat)
    }

    fn too_large(&self) -> AnalysisError {
        AnalysisError::FrameTooLarge {
            width: self.width,
            height: self.height,
        }
    }
}
