// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Predict endpoint: POST /predict
//!
//! The request is multipart form data (field `image`) rather than JSON, so
//! there is no request type here; validation happens in the handler while
//! walking the form fields.

pub mod handler;
pub mod response;

pub use handler::predict_handler;
pub use response::PredictResponse;
