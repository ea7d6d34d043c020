//! # FFI Module
//!
//! Boundary to the native Otto library.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          FFI ARCHITECTURE                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Safe wrappers (Instance, Certificate, streams, ...)                    │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  ┌──────────────┐                                                       │
//! │  │   OttoApi    │  trait: one unsafe fn per native function             │
//! │  └──────┬───────┘                                                       │
//! │         │                                                               │
//! │    ┌────┴──────────────┐                                                │
//! │    ▼                   ▼                                                │
//! │  DynamicLibrary      MockOtto (testing)                                 │
//! │  (libotto via                                                           │
//! │   libloading)                                                           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod api;
mod library;
mod types;

pub use api::OttoApi;
pub use library::DynamicLibrary;
pub use types::{RawHandle, RawLogCallback, RawProxyConfig, StatusCode, PROXY_CONFIG_VERSION};

pub(crate) use types::{lossy_string, path_to_cstring, to_cstring, to_opt_cstring};
