use image::{ImageBuffer, Rgb, Rgb32FImage};

use crate::error::{Error, Result};
use crate::types::Frame;

/// Running sum of warped images in the canonical frame.
///
/// Samples are summed in `f64`; [`Accumulator::average`] divides by the
/// number of images added so far.
#[derive(Debug, Clone)]
pub struct Accumulator {
    frame: Frame,
    sum: Vec<f64>,
    count: usize,
}

impl Accumulator {
    pub fn new(frame: Frame) -> Self {
        Self {
            frame,
            sum: vec![0.0; frame.width as usize * frame.height as usize * 3],
            count: 0,
        }
    }

    pub fn add(&mut self, image: &Rgb32FImage) -> Result<()> {
        if image.dimensions() != self.frame.dimensions() {
            return Err(Error::SizeMismatch {
                expected: self.frame.dimensions(),
                found: image.dimensions(),
            });
        }
        for (acc, &v) in self.sum.iter_mut().zip(image.as_raw().iter()) {
            *acc += v as f64;
        }
        self.count += 1;
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// The mean of everything added so far. Fails before the first add
    /// rather than dividing by zero.
    pub fn average(&self) -> Result<Rgb32FImage> {
        if self.count == 0 {
            return Err(Error::NoUsableImages);
        }
        let n = self.count as f64;
        let width = self.frame.width as usize;
        Ok(ImageBuffer::from_fn(self.frame.width, self.frame.height, |x, y| {
            let i = (y as usize * width + x as usize) * 3;
            Rgb([
                (self.sum[i] / n) as f32,
                (self.sum[i + 1] / n) as f32,
                (self.sum[i + 2] / n) as f32,
            ])
        }))
    }
}
