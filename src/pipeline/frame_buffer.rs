use rayon::prelude::*;

use crate::{
    error::FrameError,
    types::{Frame, PixelFormat},
};

pub type RawImage = (u32, u32, u32, Vec<u8>);

/// Validates a raw buffer and takes ownership of it as a [`Frame`].
pub fn to_internal(
    width: u32,
    height: u32,
    channels: u32,
    bytes: Vec<u8>,
) -> Result<Frame, FrameError> {
    Frame::new(width, height, channels, bytes)
}

pub fn from_internal(frame: Frame) -> RawImage {
    let (width, height, channels) = (frame.width(), frame.height(), frame.channels());
    (width, height, channels, frame.into_data())
}

pub fn to_rgba(frame: &Frame) -> Frame {
    let rgba = match frame.format() {
        PixelFormat::Rgba8 => return frame.clone(),
        PixelFormat::Rgb8 => rgb_to_rgba(frame.data()),
        PixelFormat::Gray8 => gray_to_rgba(frame.data()),
    };
    rebuild(frame, PixelFormat::Rgba8, rgba)
}

fn rgb_to_rgba(data: &[u8]) -> Vec<u8> {
    let mut rgba = vec![0u8; data.len() / 3 * 4];
    rgba.par_chunks_mut(4)
        .zip(data.par_chunks_exact(3))
        .for_each(|(dst, src)| {
            dst[..3].copy_from_slice(src);
            dst[3] = 255;
        });
    rgba
}

fn gray_to_rgba(data: &[u8]) -> Vec<u8> {
    let mut rgba = vec![0u8; data.len() * 4];
    rgba.par_chunks_mut(4)
        .zip(data.par_iter().copied())
        .for_each(|(dst, value)| {
            dst[0] = value;
            dst[1] = value;
            dst[2] = value;
            dst[3] = 255;
        });
    rgba
}

/// Single-channel luma using BT.601 weights in 14-bit fixed point.
pub fn rgb_to_gray(frame: &Frame) -> Frame {
    let stride = frame.channels() as usize;
    if stride == 1 {
        return frame.clone();
    }
    let gray: Vec<u8> = frame
        .data()
        .par_chunks_exact(stride)
        .map(|px| luma(px[0], px[1], px[2]))
        .collect();
    rebuild(frame, PixelFormat::Gray8, gray)
}

pub(crate) fn luma(r: u8, g: u8, b: u8) -> u8 {
    let y = r as u32 * 4899 + g as u32 * 9617 + b as u32 * 1868 + (1 << 13);
    (y >> 14).min(255) as u8
}

pub fn invert(frame: &Frame) -> Frame {
    let stride = frame.channels() as usize;
    let mut out = frame.clone();
    out.data_mut().par_chunks_mut(stride).for_each(|px| {
        let colour = if stride == 4 { 3 } else { stride };
        for sample in &mut px[..colour] {
            *sample = 255 - *sample;
        }
    });
    out
}

fn rebuild(frame: &Frame, format: PixelFormat, data: Vec<u8>) -> Frame {
    // Every conversion above emits exactly width * height pixels.
    Frame::new(frame.width(), frame.height(), format.channels(), data)
        .unwrap_or_else(|err| unreachable!("pixel conversion broke frame shape: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(width: u32, height: u32, channels: u32, data: Vec<u8>) -> Frame {
        to_internal(width, height, channels, data).unwrap()
    }

    #[test]
    fn to_internal_rejects_short_buffer() {
        let err = to_internal(3, 2, 3, vec![0; 10]).unwrap_err();
        assert!(matches!(err, FrameError::LengthMismatch { .. }));
    }

    #[test]
    fn to_internal_rejects_two_channels() {
        let err = to_internal(1, 1, 2, vec![0; 2]).unwrap_err();
        assert_eq!(err, FrameError::UnsupportedChannels { channels: 2 });
    }

    #[test]
    fn rgb_expands_to_opaque_rgba() {
        let rgba = to_rgba(&frame(2, 1, 3, vec![1, 2, 3, 4, 5, 6]));
        assert_eq!(rgba.channels(), 4);
        assert_eq!(rgba.data(), &[1, 2, 3, 255, 4, 5, 6, 255]);
    }

    #[test]
    fn gray_expands_to_rgba() {
        let rgba = to_rgba(&frame(2, 1, 1, vec![7, 9]));
        assert_eq!(rgba.data(), &[7, 7, 7, 255, 9, 9, 9, 255]);
    }

    #[test]
    fn gray_conversion_uses_luma_weights() {
        let gray = rgb_to_gray(&frame(3, 1, 3, vec![255, 0, 0, 0, 255, 0, 255, 255, 255]));
        assert_eq!(gray.channels(), 1);
        assert_eq!(gray.data(), &[76, 150, 255]);
    }

    #[test]
    fn gray_conversion_ignores_alpha() {
        let gray = rgb_to_gray(&frame(1, 1, 4, vec![0, 0, 0, 255]));
        assert_eq!(gray.data(), &[0]);
    }

    #[test]
    fn invert_keeps_alpha() {
        let inverted = invert(&frame(1, 1, 4, vec![0, 100, 255, 42]));
        assert_eq!(inverted.data(), &[255, 155, 0, 42]);
    }

    #[test]
    fn invert_is_an_involution() {
        let original = frame(2, 2, 3, (0..12).collect());
        assert_eq!(invert(&invert(&original)), original);
    }
}
