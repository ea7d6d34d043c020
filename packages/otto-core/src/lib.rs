//! # Otto Core
//!
//! Safe Rust binding for Otto, the vendor-supplied native library that
//! sends and receives signed, checksummed objects to and from an OTTER
//! endpoint.
//!
//! All protocol work (transport, crypto, retries) happens inside the native
//! library. This crate owns what happens at the boundary: handle lifetimes,
//! buffer copying, error translation and streaming adapters.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          OTTO CORE MODULES                              │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────┐   ┌─────────────┐   ┌───────────────┐                  │
//! │  │  Instance   │──►│ Certificate │──►│ ChecksumStream│── sign ──┐       │
//! │  │             │   │             │   │ (io::Write)   │          │       │
//! │  │ - log sink  │   │ - token+PIN │   └───────────────┘          ▼       │
//! │  │ - proxy     │   │ - eID URL   │                     ┌─────────────┐  │
//! │  │ - settings  │   └──────┬──────┘                     │ SendStream  │  │
//! │  └──────┬──────┘          │                            │ (io::Write) │  │
//! │         │                 ▼                            │ finish()→id │  │
//! │         │          ┌──────────────┐                    └─────────────┘  │
//! │         │          │ReceiveStream │                                     │
//! │         │          │ (io::Read)   │                                     │
//! │         │          └──────────────┘                                     │
//! │         ▼                                                               │
//! │  ┌──────────────┐  ┌──────────────┐  ┌─────────────┐                    │
//! │  │ ReturnBuffer │  │TransferBuffer│  │ NativeHandle│                    │
//! │  └──────────────┘  └──────────────┘  └─────────────┘                    │
//! │                                                                         │
//! │  ─────────────────────────── ffi::OttoApi ─────────────────────────     │
//! │          DynamicLibrary (libotto)   |   testing::MockOtto               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error type and status translation
//! - [`ffi`] - Native call table and runtime library loading
//! - [`handle`] - Typed native handles and scoped cleanup
//! - [`instance`] - Top-level session, proxy, settings, one-shot fetch
//! - [`certificate`] - Signing identities
//! - [`return_buffer`] - Native result buffers
//! - [`transfer`] - Scratch buffer for outgoing blocks
//! - [`checksum`] - Checksum accumulator
//! - [`send`] - Send session
//! - [`receive`] - Receive session
//! - [`log`] - Native log callback
//! - [`config`] - Proxy configuration and fetch requests
//!
//! ## Lifetimes
//!
//! Every resource borrows the one it was opened from, so closing in
//! reverse order is enforced by the compiler:
//!
//! ```text
//! Instance ◄── Certificate<'i> ◄── ReceiveStream<'a>
//!    ▲   ◄── ChecksumStream<'i>
//!    └────── SendStream<'i>, ReturnBuffer<'i>
//! ```
//!
//! Each wrapper has an explicit `close()` that reports release failures
//! and can be called more than once; `Drop` closes whatever is still open
//! and logs failures.
//!
//! ## Threading
//!
//! Handles are not `Send`. The library does not document concurrent use
//! of one handle, and this crate adds no synchronization of its own.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod certificate;
pub mod checksum;
pub mod config;
pub mod error;
pub mod ffi;
pub mod handle;
pub mod instance;
pub mod log;
pub mod receive;
pub mod return_buffer;
pub mod send;
pub mod transfer;

#[cfg(any(test, feature = "testing"))]
#[cfg_attr(docsrs, doc(cfg(feature = "testing")))]
pub mod testing;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use certificate::{Certificate, CertificateSource};
pub use checksum::ChecksumStream;
pub use config::{FetchRequest, ProxyConfig};
pub use error::{Error, Result};
pub use ffi::{DynamicLibrary, OttoApi, StatusCode};
pub use instance::Instance;
pub use log::{LogLevel, LogRecord, LogSink, TracingLogSink};
pub use receive::ReceiveStream;
pub use return_buffer::ReturnBuffer;
pub use send::SendStream;
pub use transfer::{TransferBuffer, MIN_TRANSFER_CAPACITY};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
