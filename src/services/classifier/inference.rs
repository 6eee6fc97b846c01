use crate::config::{Normalization, PreprocessSettings, ResizeMode};
use crate::error::AppError;
use crate::models::classify_types::Prediction;
use crate::services::classifier::model_manager::OnnxSession;
use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::Array4;
use ort::value::Value;

const CROP_PCT: f32 = 0.875;

// ImageNet normalization constants
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Turn a decoded image into a `[1, 3, size, size]` NCHW tensor.
pub fn preprocess_image(img: &DynamicImage, settings: &PreprocessSettings) -> Result<Array4<f32>, AppError> {
    let size = settings.size;
    let square = match settings.resize {
        ResizeMode::Stretch => img.resize_exact(size, size, FilterType::Triangle),
        ResizeMode::CenterCrop => {
            // Resize shortest edge to ceil(size / crop_pct), then center crop
            let resize_size = (size as f32 / CROP_PCT).ceil() as u32;
            let (w, h) = (img.width().max(1), img.height().max(1));
            let (new_w, new_h) = if w < h {
                (resize_size, ((h as f32 / w as f32) * resize_size as f32).round() as u32)
            } else {
                (((w as f32 / h as f32) * resize_size as f32).round() as u32, resize_size)
            };
            let resized = img.resize_exact(new_w, new_h, FilterType::Triangle);
            let crop_x = new_w.saturating_sub(size) / 2;
            let crop_y = new_h.saturating_sub(size) / 2;
            resized.crop_imm(crop_x, crop_y, size, size)
        }
    };
    let rgb = square.to_rgb8();

    // Normalize while scattering HWC pixels into CHW planes.
    let hw = (size * size) as usize;
    let mut data = vec![0f32; 3 * hw];
    for (i, pixel) in rgb.as_raw().chunks_exact(3).enumerate() {
        for c in 0..3 {
            data[c * hw + i] = normalize(pixel[c], c, settings.normalization);
        }
    }

    Array4::from_shape_vec((1, 3, size as usize, size as usize), data)
        .map_err(|e| AppError::Inference(format!("Failed to create tensor: {}", e)))
}

fn normalize(value: u8, channel: usize, normalization: Normalization) -> f32 {
    match normalization {
        Normalization::Symmetric => value as f32 / 127.5 - 1.0,
        Normalization::Imagenet => (value as f32 / 255.0 - MEAN[channel]) / STD[channel],
    }
}

/// Softmax the logits and return the `top_k` most probable labels, best first.
pub fn rank_predictions(logits: &[f32], labels: &[String], top_k: usize) -> Vec<Prediction> {
    let max_logit = logits.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let exp_sum: f32 = logits.iter().map(|&x| (x - max_logit).exp()).sum();

    let mut indexed: Vec<(usize, f32)> = logits
        .iter()
        .map(|&x| (x - max_logit).exp() / exp_sum)
        .enumerate()
        .collect();
    indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let top_k = top_k.min(indexed.len());
    indexed[..top_k]
        .iter()
        .map(|&(idx, conf)| Prediction {
            class_name: labels
                .get(idx)
                .cloned()
                .unwrap_or_else(|| format!("class_{}", idx)),
            confidence: conf,
        })
        .collect()
}

/// First synonym of an ImageNet-style label ("seashore, coast" -> "seashore").
pub fn short_label(label: &str) -> &str {
    label.split(',').next().unwrap_or(label).trim()
}

pub fn run_inference_with_model(
    session: &mut OnnxSession,
    input: Array4<f32>,
    labels: &[String],
    top_k: usize,
) -> Result<Vec<Prediction>, AppError> {
    // Single-input model
    let input_name = session.inputs()[0].name().to_string();

    let input_tensor = Value::from_array(input)
        .map_err(|e| AppError::Inference(format!("Failed to create tensor value: {}", e)))?;

    let outputs = session
        .run(ort::inputs![input_name.as_str() => input_tensor])
        .map_err(|e| AppError::Inference(format!("Inference failed: {}", e)))?;

    let output_value = outputs
        .values()
        .next()
        .ok_or_else(|| AppError::Inference("Model produced no outputs".to_string()))?;

    let (_, logits) = output_value
        .try_extract_tensor::<f32>()
        .map_err(|e| AppError::Inference(format!("Failed to extract output tensor: {}", e)))?;

    Ok(rank_predictions(logits, labels, top_k))
}
