// src/lib.rs

//! Lectio: daily liturgical readings retrieval, extraction and delivery.

pub mod error;
#[cfg(feature = "lambda")]
pub mod lambda;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
