pub mod client;
pub mod error;

pub use client::{
    Candidate, CandidatePage, ExtractIntentsResult, SynthesisResult, UpstreamApi, UpstreamClient,
    UpstreamCredential,
};
pub use error::UpstreamError;
