//! Frame preprocessing for classification
//!
//! Fits a camera frame into the square model input according to the
//! crop/scale policy and converts it to a normalized NCHW float tensor.

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Rgba, RgbaImage};

use super::{ClassifierError, CropAndScale};
use crate::camera::CameraFrame;

/// ImageNet channel means (RGB)
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNet channel standard deviations (RGB)
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Source region of a frame, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Largest centred square inside a `width` x `height` frame
pub fn center_square(width: u32, height: u32) -> CropRect {
    let side = width.min(height);
    CropRect {
        x: (width - side) / 2,
        y: (height - side) / 2,
        width: side,
        height: side,
    }
}

/// Size of a frame scaled to fit inside a `size` x `size` square, keeping aspect
pub fn fit_size(width: u32, height: u32, size: u32) -> (u32, u32) {
    if width >= height {
        let scaled = ((height as u64 * size as u64) / width.max(1) as u64) as u32;
        (size, scaled.max(1))
    } else {
        let scaled = ((width as u64 * size as u64) / height.max(1) as u64) as u32;
        (scaled.max(1), size)
    }
}

/// Resize a frame into a `size` x `size` RGBA image
pub fn fit_to_input(frame: &CameraFrame, size: u32, policy: CropAndScale) -> Result<RgbaImage, ClassifierError> {
    if !frame.is_complete() {
        return Err(ClassifierError::Preprocess(format!(
            "frame {} has {} bytes for {}x{}",
            frame.frame_number,
            frame.data.len(),
            frame.width,
            frame.height
        )));
    }
    if size == 0 {
        return Err(ClassifierError::Preprocess("input size is zero".to_string()));
    }

    let source = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(frame.width, frame.height, frame.data.clone())
        .ok_or_else(|| ClassifierError::Preprocess("pixel buffer too small".to_string()))?;

    let fitted = match policy {
        CropAndScale::CenterCrop => {
            let rect = center_square(frame.width, frame.height);
            let square = imageops::crop_imm(&source, rect.x, rect.y, rect.width, rect.height).to_image();
            imageops::resize(&square, size, size, FilterType::Triangle)
        }
        CropAndScale::ScaleFill => imageops::resize(&source, size, size, FilterType::Triangle),
        CropAndScale::ScaleFit => {
            let (w, h) = fit_size(frame.width, frame.height, size);
            let scaled = imageops::resize(&source, w, h, FilterType::Triangle);
            let mut canvas = RgbaImage::from_pixel(size, size, Rgba([0, 0, 0, 255]));
            imageops::overlay(&mut canvas, &scaled, ((size - w) / 2) as i64, ((size - h) / 2) as i64);
            canvas
        }
    };

    Ok(fitted)
}

/// Convert to CHW format (channels first) with per-channel normalization
pub fn to_chw_normalized(image: &RgbaImage, mean: [f32; 3], std: [f32; 3]) -> Vec<f32> {
    let (width, height) = image.dimensions();
    let channel_stride = (width * height) as usize;
    let mut output = vec![0.0f32; channel_stride * 3];

    for (x, y, pixel) in image.enumerate_pixels() {
        let pixel_idx = (y * width + x) as usize;
        for c in 0..3 {
            let value = pixel[c] as f32 / 255.0;
            output[c * channel_stride + pixel_idx] = (value - mean[c]) / std[c];
        }
    }

    output
}

/// Softmax over raw scores, numerically stable
pub fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum > 0.0 {
        exps.into_iter().map(|e| e / sum).collect()
    } else {
        exps
    }
}

/// Whether scores already form a probability distribution
pub fn is_probability_distribution(scores: &[f32]) -> bool {
    let in_range = scores.iter().all(|s| (0.0..=1.0).contains(s));
    let sum: f32 = scores.iter().sum();
    in_range && (sum - 1.0).abs() < 1e-3
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn frame(width: u32, height: u32, fill: impl Fn(u32, u32) -> [u8; 4]) -> CameraFrame {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&fill(x, y));
            }
        }
        CameraFrame {
            data,
            width,
            height,
            frame_number: 7,
            timestamp: Instant::now(),
        }
    }

    #[test]
    fn test_center_square_landscape() {
        assert_eq!(
            center_square(1280, 720),
            CropRect { x: 280, y: 0, width: 720, height: 720 }
        );
    }

    #[test]
    fn test_center_square_portrait() {
        assert_eq!(
            center_square(720, 1280),
            CropRect { x: 0, y: 280, width: 720, height: 720 }
        );
    }

    #[test]
    fn test_fit_size() {
        assert_eq!(fit_size(1280, 720, 224), (224, 126));
        assert_eq!(fit_size(720, 1280, 224), (126, 224));
        assert_eq!(fit_size(100, 100, 224), (224, 224));
    }

    #[test]
    fn test_center_crop_discards_sides() {
        // Red left quarter, blue right quarter, green centre
        let input = frame(8, 4, |x, _| match x {
            0 | 1 => [255, 0, 0, 255],
            6 | 7 => [0, 0, 255, 255],
            _ => [0, 255, 0, 255],
        });
        let fitted = fit_to_input(&input, 4, CropAndScale::CenterCrop).unwrap();
        assert_eq!(fitted.dimensions(), (4, 4));
        assert!(fitted.pixels().all(|p| p[1] == 255 && p[0] == 0 && p[2] == 0));
    }

    #[test]
    fn test_scale_fit_pads_with_black() {
        let input = frame(8, 4, |_, _| [255, 255, 255, 255]);
        let fitted = fit_to_input(&input, 8, CropAndScale::ScaleFit).unwrap();
        assert_eq!(fitted.dimensions(), (8, 8));
        assert_eq!(fitted.get_pixel(0, 0)[0], 0);
        assert_eq!(fitted.get_pixel(4, 4)[0], 255);
    }

    #[test]
    fn test_incomplete_frame_rejected() {
        let mut input = frame(4, 4, |_, _| [0, 0, 0, 255]);
        input.data.truncate(10);
        assert!(matches!(
            fit_to_input(&input, 4, CropAndScale::ScaleFill),
            Err(ClassifierError::Preprocess(_))
        ));
    }

    #[test]
    fn test_chw_layout_and_normalization() {
        let image = RgbaImage::from_pixel(2, 1, Rgba([255, 0, 0, 255]));
        let tensor = to_chw_normalized(&image, [0.0; 3], [1.0; 3]);
        assert_eq!(tensor, vec![1.0, 1.0, 0.0, 0.0, 0.0, 0.0]);

        let normalized = to_chw_normalized(&image, IMAGENET_MEAN, IMAGENET_STD);
        assert!((normalized[0] - (1.0 - 0.485) / 0.229).abs() < 1e-5);
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&[1.0, 2.0, 3.0]);
        assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!(probs[2] > probs[1] && probs[1] > probs[0]);
    }

    #[test]
    fn test_probability_detection() {
        assert!(is_probability_distribution(&[0.25, 0.75]));
        assert!(!is_probability_distribution(&[2.0, -1.0]));
        assert!(!is_probability_distribution(&[0.2, 0.2]));
    }
}
