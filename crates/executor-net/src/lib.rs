//! The threshold executor network: a fixed registry of executors holding
//! key shares, and the coordinator that drives 3-of-5 decryption and
//! signing against them with deadlines, quorum selection, and failure
//! accounting.

pub mod coordinator;
pub mod executor;
mod metrics;
pub mod registry;
pub mod signing;
pub mod transport;

pub use {
    coordinator::{Coordinator, CoordinatorConfig, Decryption, Error},
    executor::{LocalExecutor, LocalTransport},
    registry::{ExecutorDescriptor, Registry},
    signing::ThresholdSignature,
    transport::{Endpoint, Request, Response, Transport, TransportError},
};
