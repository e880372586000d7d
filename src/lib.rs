// src/lib.rs

//! flatscan: watches Berlin housing sites and announces new apartments

pub mod error;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
