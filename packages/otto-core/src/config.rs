//! # Configuration
//!
//! Proxy configuration and the request type for one-shot fetches.

use std::ffi::CString;

use crate::error::Result;
use crate::ffi::{to_cstring, to_opt_cstring, RawProxyConfig, PROXY_CONFIG_VERSION};

/// HTTP proxy used by an instance for all OTTER traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Proxy address, e.g. `proxy.example.org:3128`
    pub url: String,
    /// User name for proxy authentication
    pub user_name: Option<String>,
    /// Password for proxy authentication
    pub password: Option<String>,
    /// Authentication method (`Basic`, `Digest`, `NTLM`, ...)
    pub auth_method: Option<String>,
}

impl ProxyConfig {
    /// Proxy without authentication.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user_name: None,
            password: None,
            auth_method: None,
        }
    }

    /// Set credentials.
    pub fn with_credentials(
        mut self,
        user_name: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.user_name = Some(user_name.into());
        self.password = Some(password.into());
        self
    }

    /// Set the authentication method.
    pub fn with_auth_method(mut self, auth_method: impl Into<String>) -> Self {
        self.auth_method = Some(auth_method.into());
        self
    }

    pub(crate) fn marshal(&self) -> Result<MarshaledProxy> {
        Ok(MarshaledProxy {
            url: to_cstring(&self.url, "proxy url")?,
            user_name: to_opt_cstring(self.user_name.as_deref(), "proxy user name")?,
            password: to_opt_cstring(self.password.as_deref(), "proxy password")?,
            auth_method: to_opt_cstring(self.auth_method.as_deref(), "proxy auth method")?,
        })
    }
}

/// C strings backing a [`RawProxyConfig`].
pub(crate) struct MarshaledProxy {
    url: CString,
    user_name: Option<CString>,
    password: Option<CString>,
    auth_method: Option<CString>,
}

impl MarshaledProxy {
    /// The C struct. Its pointers borrow from `self`.
    pub(crate) fn raw(&self) -> RawProxyConfig {
        let ptr = |s: &Option<CString>| s.as_deref().map_or(std::ptr::null(), |c| c.as_ptr());
        RawProxyConfig {
            version: PROXY_CONFIG_VERSION,
            url: self.url.as_ptr(),
            user_name: ptr(&self.user_name),
            password: ptr(&self.password),
            auth_method: ptr(&self.auth_method),
        }
    }
}

/// Parameters for [`Instance::fetch_data`](crate::Instance::fetch_data).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchRequest {
    /// Id of the object to fetch
    pub object_id: String,
    /// Expected object size in bytes; used by the library to size its buffer
    pub expected_size: u32,
    /// Certificate file path or eID-client URL; `None` passes null
    pub certificate_location: Option<String>,
    /// Certificate PIN; `None` for eID clients
    pub password: Option<String>,
    /// Vendor id
    pub vendor_id: String,
    /// Base64 PEM certificate to re-encrypt the data for
    pub pickup_certificate: Option<String>,
}
