//! Jimaku - Timed Caption Compositing
//!
//! Groups timed narration words into caption segments, renders styled and
//! animated captions over a source video frame by frame, muxes the narration
//! track into the result, and stretches narration audio to a target length.

pub mod cli;
pub mod compile;
pub mod config;
pub mod error;
pub mod media;
pub mod render;
pub mod retime;
pub mod segmenter;
pub mod style;
pub mod subtitle;
pub mod timing;
pub mod workflow;
