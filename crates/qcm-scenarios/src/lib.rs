//! # qcm-scenarios: Study Cases and Renewable Profiles
//!
//! Deterministic benchmark networks for the congestion optimizer plus
//! stochastic wind-penetration profiles with CSV/manifest export.

pub mod cases;
pub mod wind;

pub use cases::{attach_wind_farm, stress_case};
pub use wind::{write_profile_csv, ProfileManifest, WindProfileSpec, WindSample};
