//! Real-time DSP engine for an interactive lock-in amplifier simulator.
//!
//! The engine runs a sample-accurate signal chain — oscillators, AM
//! modulation, noise injection, a configurable band-pass filter, an I/Q
//! mixer, and low-pass output filters — on its own thread, and hands
//! decimated snapshots to a display consumer through a lock-free
//! double-buffered shared region. Rendering, input widgets, and persistence
//! live outside this crate; see [`facade::EngineFacade`] for the boundary.

pub mod biquad;
pub mod chain_runner;
pub mod config;
pub mod double_buffer;
pub mod dut;
pub mod error;
pub mod facade;
pub mod filter_design;
pub mod interferer;
pub mod math;
pub mod mixer;
pub mod noise;
pub mod oscillator;
pub mod ring_buffer;
pub mod scheduler;
pub mod spectrum;
pub mod trigger;

pub use chain_runner::{ChainRunner, FrameReady, Outputs};
pub use config::{EngineParams, ParamsDiff};
pub use double_buffer::{Channel, DoubleBuffer, Reader, Writer};
pub use error::EngineError;
pub use facade::{ControlMessage, EngineFacade, EventMessage};
