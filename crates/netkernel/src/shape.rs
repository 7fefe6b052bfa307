//! # Shape planning
//!
//! Whenever the upstream frame geometry changes, the network's primary input
//! tensor is reshaped to the geometry the descriptor asks for: optional
//! transpose, aspect-preserving or fixed resize, then alignment padding.
//!
//! The aspect-preserving branch keeps the arithmetic deployed models were
//! calibrated against. With `input_width` the scale is computed after the
//! width has already been overwritten, so it is always `1.0` and the height
//! passes through unchanged. Downstream consumers depend on these numbers.

use crate::column::FrameInfo;
use crate::descriptor::ModelDescriptor;
use crate::error::{Error, Result};
use crate::tensor::constant::{BATCH_DIM, CHANNEL_DIM};

/// `(batch, channels, height, width)` bound to the network input
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DerivedInputShape {
    pub batch_size: usize,
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl DerivedInputShape {
    pub fn dims(&self) -> [usize; 4] {
        [self.batch_size, self.channels, self.height, self.width]
    }
}

/// Round `value` up to the next multiple of `modulus`
pub fn pad_to_multiple(value: i32, modulus: i32) -> Result<i32> {
    let rem = value % modulus;
    if rem == 0 {
        return Ok(value);
    }
    value.checked_add(modulus - rem).ok_or_else(|| {
        Error::Contract(format!("padding {value} to a multiple of {modulus} overflows"))
    })
}

/// Width and height the network should see for frames of `frame` geometry
pub fn target_geometry(frame: FrameInfo, descriptor: &ModelDescriptor) -> Result<(i32, i32)> {
    let (mut width, mut height) = if descriptor.transpose {
        (frame.height, frame.width)
    } else {
        (frame.width, frame.height)
    };

    if descriptor.preserve_aspect_ratio {
        if let Some(input_width) = descriptor.input_width {
            width = input_width as i32;
            let scale = input_width as f32 / width as f32;
            width = (width as f32 * scale) as i32;
            height = (height as f32 * scale) as i32;
        } else if let Some(input_height) = descriptor.input_height {
            let scale = input_height as f32 / height as f32;
            width = (width as f32 * scale) as i32;
            height = (height as f32 * scale) as i32;
        }
    } else if let (Some(w), Some(h)) = (descriptor.input_width, descriptor.input_height) {
        width = w as i32;
        height = h as i32;
    }

    if let Some(pad) = descriptor.pad_mod {
        width = pad_to_multiple(width, pad as i32)?;
        height = pad_to_multiple(height, pad as i32)?;
    }
    Ok((width, height))
}

/// Derive the input shape for `frame`, keeping the batch and channel
/// dimensions of the currently bound tensor
pub fn derive_input_shape(
    frame: FrameInfo,
    descriptor: &ModelDescriptor,
    bound_shape: &[usize],
) -> Result<DerivedInputShape> {
    if bound_shape.len() != 4 {
        return Err(Error::Contract(format!(
            "input layer '{}' has shape {bound_shape:?}, expected (batch, channels, height, width)",
            descriptor.input_layer_names[0]
        )));
    }
    if frame.width <= 0 || frame.height <= 0 {
        return Err(Error::Contract(format!(
            "frame geometry {}x{} is not positive",
            frame.width, frame.height
        )));
    }
    let (width, height) = target_geometry(frame, descriptor)?;
    let width = positive_dim(width, "width", frame)?;
    let height = positive_dim(height, "height", frame)?;
    Ok(DerivedInputShape {
        batch_size: bound_shape[BATCH_DIM],
        channels: bound_shape[CHANNEL_DIM],
        height,
        width,
    })
}

fn positive_dim(value: i32, name: &str, frame: FrameInfo) -> Result<usize> {
    usize::try_from(value)
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| {
            Error::Contract(format!(
                "derived input {name} {value} for frame {}x{} is not positive",
                frame.width, frame.height
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::parse_descriptor;
    use crate::descriptor::tests::MINIMAL;

    fn descriptor(extra: &str) -> ModelDescriptor {
        parse_descriptor(&MINIMAL.replacen("[net]\n", &format!("[net]\n{extra}\n"), 1)).unwrap()
    }

    #[test]
    fn test_no_resize_keeps_frame() {
        let d = descriptor("");
        assert_eq!(target_geometry(FrameInfo::new(640, 480), &d).unwrap(), (640, 480));
    }

    #[test]
    fn test_transpose_swaps() {
        let d = descriptor("transpose = true");
        assert_eq!(target_geometry(FrameInfo::new(640, 480), &d).unwrap(), (480, 640));
    }

    #[test]
    fn test_aspect_width_keeps_literal_height() {
        // the width-driven scale is computed after the overwrite and is 1.0
        let d = descriptor("preserve_aspect_ratio = true\ninput_width = 320");
        assert_eq!(target_geometry(FrameInfo::new(640, 480), &d).unwrap(), (320, 480));
    }

    #[test]
    fn test_aspect_height_scales_both() {
        let d = descriptor("preserve_aspect_ratio = true\ninput_height = 240");
        assert_eq!(target_geometry(FrameInfo::new(640, 480), &d).unwrap(), (320, 240));

        let d = descriptor("preserve_aspect_ratio = true\ninput_height = 100");
        // 100 / 480 = 0.208333; 640 * 0.208333 truncates to 133
        assert_eq!(target_geometry(FrameInfo::new(640, 480), &d).unwrap(), (133, 100));
    }

    #[test]
    fn test_fixed_resize() {
        let d = descriptor("input_width = 224\ninput_height = 200");
        assert_eq!(target_geometry(FrameInfo::new(640, 480), &d).unwrap(), (224, 200));
    }

    #[test]
    fn test_padding() {
        assert_eq!(pad_to_multiple(300, 32).unwrap(), 320);
        assert_eq!(pad_to_multiple(211, 32).unwrap(), 224);
        assert_eq!(pad_to_multiple(256, 32).unwrap(), 256);

        let d = descriptor("input_width = 300\ninput_height = 211\npad_mod = 32");
        assert_eq!(target_geometry(FrameInfo::new(640, 480), &d).unwrap(), (320, 224));

        let d = descriptor("input_width = 256\ninput_height = 256\npad_mod = 32");
        assert_eq!(target_geometry(FrameInfo::new(640, 480), &d).unwrap(), (256, 256));
    }

    #[test]
    fn test_padding_overflow_is_an_error() {
        assert!(pad_to_multiple(i32::MAX, 32).unwrap_err().is_contract());

        let d = descriptor("input_width = 2147483647\ninput_height = 1\npad_mod = 32");
        assert!(target_geometry(FrameInfo::new(640, 480), &d).unwrap_err().is_contract());
        assert!(derive_input_shape(FrameInfo::new(640, 480), &d, &[1, 3, 1, 1]).unwrap_err().is_contract());
    }

    #[test]
    fn test_derive_rejects_non_positive_frames() {
        let d = descriptor("pad_mod = 32");
        for frame in [FrameInfo::new(-5, -7), FrameInfo::new(0, 10), FrameInfo::new(10, -1)] {
            let err = derive_input_shape(frame, &d, &[1, 3, 1, 1]).unwrap_err();
            assert!(err.is_contract(), "{frame:?}");
        }
    }

    #[test]
    fn test_derive_keeps_batch_and_channels() {
        let d = descriptor("pad_mod = 8");
        let shape = derive_input_shape(FrameInfo::new(30, 20), &d, &[4, 3, 224, 224]).unwrap();
        assert_eq!(shape.dims(), [4, 3, 24, 32]);
    }

    #[test]
    fn test_derive_rejects_bad_shapes() {
        let d = descriptor("");
        assert!(derive_input_shape(FrameInfo::new(30, 20), &d, &[4, 3]).unwrap_err().is_contract());
        assert!(derive_input_shape(FrameInfo::new(0, 20), &d, &[1, 3, 1, 1]).unwrap_err().is_contract());
    }
}
