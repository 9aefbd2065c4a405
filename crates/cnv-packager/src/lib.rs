//! Packaging and transmission contracts, and the registry of configured
//! targets.
//!
//! A **packager** is everything the engine needs to deposit into one target:
//! an [`Assembler`] that builds the package, a [`Transport`] that moves it,
//! a [`DepositStatusProcessor`] that interprets the target's asynchronous
//! status documents, and the target's [`TargetConfig`]. The
//! [`PackagerRegistry`] maps a target repository to its packager; the
//! registry is built once at startup and read-only afterwards.

pub mod assembler;
pub mod config;
pub mod registry;
pub mod status;
pub mod transport;

pub use assembler::{
    Archive, Assembler, AssemblerOptions, Checksum, ChecksumAlgorithm, Compression,
    FileRetriever, PackageMetadata, PackageStream,
};
pub use config::{
    AssemblerSection, AuthRealm, DepositConfig, PrefixRewrite, ProcessingConfig, TargetConfig,
    TransportSection,
};
pub use registry::{Packager, PackagerRegistry};
pub use status::{
    DepositStatusOutcome, DepositStatusProcessor, MappingStatusProcessor, StatusMapping,
};
pub use transport::{
    params, DepositReceipt, Transport, TransportParams, TransportResponse, TransportSession,
};
