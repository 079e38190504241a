// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Bounding-box annotation rendering
//!
//! Draws filtered predictions onto the source image and returns PNG bytes.
//! Rendering sits behind the `Annotate` trait so request handlers never
//! depend on the raster backend directly.

use ab_glyph::{FontVec, PxScale};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

use crate::detection::Prediction;

const BOX_COLOR: Rgb<u8> = Rgb([220, 30, 30]);
const LABEL_TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const LABEL_FONT_SIZE: f32 = 16.0;
const LABEL_HEIGHT: i32 = 18;
const LABEL_CHAR_WIDTH: f32 = 9.0; // rough average glyph width
const LABEL_TEXT_VERTICAL_PADDING: i32 = 2;

#[derive(Debug, Error)]
pub enum AnnotateError {
    #[error("Failed to encode annotated image: {0}")]
    Encode(#[from] image::ImageError),
}

/// Rendering interface for annotated detection output.
pub trait Annotate: Send + Sync {
    /// Draws every prediction with `score > threshold` onto a copy of
    /// `image` and returns the result as PNG bytes. No other side effects.
    fn render(
        &self,
        image: &DynamicImage,
        prediction: &Prediction,
        threshold: f32,
    ) -> Result<Vec<u8>, AnnotateError>;
}

/// Rectangle-and-score-label annotator backed by imageproc.
pub struct BoxAnnotator {
    /// Label font; without one only rectangles are drawn
    font: Option<FontVec>,
}

impl BoxAnnotator {
    /// Creates an annotator, loading the label font from `font_path` when
    /// given. A missing or unparseable font degrades to box-only output
    /// instead of failing startup.
    pub fn new(font_path: Option<&Path>) -> Self {
        let font = font_path.and_then(|path| match std::fs::read(path) {
            Ok(data) => match FontVec::try_from_vec(data) {
                Ok(font) => Some(font),
                Err(e) => {
                    warn!("Failed to parse font {}: {}", path.display(), e);
                    None
                }
            },
            Err(e) => {
                warn!("Failed to read font {}: {}", path.display(), e);
                None
            }
        });

        if font.is_none() {
            warn!("No label font loaded, annotations will omit score text");
        }

        Self { font }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    fn draw_detection(&self, img: &mut RgbImage, bbox: &[f32; 4], score: f32) {
        let (w, h) = (img.width() as f32, img.height() as f32);

        // Clamp to image bounds; non-finite coordinates collapse to zero
        // and the resulting degenerate box is skipped below
        let clamp = |v: f32, max: f32| {
            if v.is_finite() {
                v.clamp(0.0, max)
            } else {
                0.0
            }
        };
        let x_min = clamp(bbox[0], w - 1.0);
        let y_min = clamp(bbox[1], h - 1.0);
        let x_max = clamp(bbox[2], w - 1.0);
        let y_max = clamp(bbox[3], h - 1.0);

        let box_w = (x_max - x_min).floor() as i32;
        let box_h = (y_max - y_min).floor() as i32;
        if box_w < 1 || box_h < 1 {
            return;
        }

        let (x, y) = (x_min.floor() as i32, y_min.floor() as i32);

        // 2px border: outer rectangle plus a 1px inset
        let outer = Rect::at(x, y).of_size(box_w as u32, box_h as u32);
        draw_hollow_rect_mut(img, outer, BOX_COLOR);
        if box_w > 2 && box_h > 2 {
            let inner = Rect::at(x + 1, y + 1).of_size(box_w as u32 - 2, box_h as u32 - 2);
            draw_hollow_rect_mut(img, inner, BOX_COLOR);
        }

        // Score label above the box, on a filled background
        if let Some(font) = &self.font {
            let label = format!("{:.2}", score);
            let text_width = (label.len() as f32 * LABEL_CHAR_WIDTH) as i32;

            let label_x = x.max(0);
            let label_y = (y - LABEL_HEIGHT).max(0);
            let max_width = (img.width() as i32 - label_x).max(0);
            let label_width = text_width.min(max_width) as u32;

            if label_width > 0 {
                let background =
                    Rect::at(label_x, label_y).of_size(label_width, LABEL_HEIGHT as u32);
                draw_filled_rect_mut(img, background, BOX_COLOR);
                draw_text_mut(
                    img,
                    LABEL_TEXT_COLOR,
                    label_x,
                    label_y + LABEL_TEXT_VERTICAL_PADDING,
                    PxScale::from(LABEL_FONT_SIZE),
                    font,
                    &label,
                );
            }
        }
    }
}

impl Annotate for BoxAnnotator {
    fn render(
        &self,
        image: &DynamicImage,
        prediction: &Prediction,
        threshold: f32,
    ) -> Result<Vec<u8>, AnnotateError> {
        let mut img = image.to_rgb8();

        for (bbox, score) in prediction.boxes.iter().zip(prediction.scores.iter()) {
            if *score > threshold {
                self.draw_detection(&mut img, bbox, *score);
            }
        }

        // Encode into an in-memory buffer; nothing is written to disk here
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
        Ok(buf)
    }
}
