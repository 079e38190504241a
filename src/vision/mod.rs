// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image decoding, tensor conversion and annotation rendering

pub mod annotator;
pub mod image_utils;

pub use annotator::{Annotate, AnnotateError, BoxAnnotator};
pub use image_utils::{
    decode_image_bytes, detect_format, image_to_chw_tensor, ImageError, ImageInfo,
};
