//! Image synthesis module

mod client;
#[cfg(any(test, feature = "test-utils"))]
mod mock;
mod stable_diffusion;

pub use client::{ImageSynthesizer, SamplingParams};
#[cfg(any(test, feature = "test-utils"))]
pub use mock::{MockImageStep, MockImageSynthesizer};
pub use stable_diffusion::StableDiffusionClient;
