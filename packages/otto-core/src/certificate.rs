//! # Certificate
//!
//! A signing identity: a software token / smart card path with PIN, or a
//! session with a local eID client addressed by URL.

use std::path::PathBuf;

use crate::error::Result;
use crate::ffi::{path_to_cstring, to_cstring, to_opt_cstring, RawHandle};
use crate::handle::{log_drop_release, CertificateKind, NativeHandle};
use crate::instance::Instance;

/// Where a certificate comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateSource {
    /// Software token file or card reader path, unlocked with `password`.
    /// `None` values are passed to the library as null.
    File {
        /// Token path
        path: Option<PathBuf>,
        /// PIN
        password: Option<String>,
    },
    /// Local eID client (e.g. AusweisApp), addressed by its URL.
    EidClient {
        /// Client URL, `http://` or `https://`
        url: String,
    },
}

impl CertificateSource {
    /// Token file with PIN.
    pub fn file(path: impl Into<PathBuf>, password: impl Into<String>) -> Self {
        CertificateSource::File {
            path: Some(path.into()),
            password: Some(password.into()),
        }
    }

    /// Classify a user-supplied location.
    ///
    /// An `http://` or `https://` URL selects the eID client and ignores
    /// `password`; anything else is a token path.
    pub fn from_location(location: Option<&str>, password: Option<&str>) -> Self {
        match location {
            Some(url) if is_http_url(url) => CertificateSource::EidClient {
                url: url.to_string(),
            },
            _ => CertificateSource::File {
                path: location.map(PathBuf::from),
                password: password.map(str::to_string),
            },
        }
    }

    /// Whether this is an eID client session.
    pub fn is_eid_client(&self) -> bool {
        matches!(self, CertificateSource::EidClient { .. })
    }
}

fn is_http_url(value: &str) -> bool {
    let lower = value.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// An open certificate, bound to the instance that opened it.
pub struct Certificate<'i> {
    instance: &'i Instance,
    handle: NativeHandle<CertificateKind>,
}

impl<'i> Certificate<'i> {
    /// Open a certificate.
    pub fn open(instance: &'i Instance, source: &CertificateSource) -> Result<Self> {
        let raw_instance = instance.raw()?;
        let (path, password) = match source {
            CertificateSource::File { path, password } => (
                path.as_deref()
                    .map(|p| path_to_cstring(p, "certificate path"))
                    .transpose()?,
                to_opt_cstring(password.as_deref(), "certificate password")?,
            ),
            CertificateSource::EidClient { url } => {
                (Some(to_cstring(url, "eID client url")?), None)
            }
        };

        let api = instance.api();
        // SAFETY: raw_instance is live while `instance` is open.
        let handle = NativeHandle::open(api, |slot| unsafe {
            api.certificate_open(raw_instance, path.as_deref(), password.as_deref(), slot)
        })?;

        tracing::debug!(eid_client = source.is_eid_client(), "Certificate opened");
        Ok(Self { instance, handle })
    }

    /// The instance this certificate belongs to.
    pub fn instance(&self) -> &'i Instance {
        self.instance
    }

    pub(crate) fn raw(&self) -> Result<RawHandle> {
        self.handle.get()
    }

    /// Whether the certificate has been closed.
    pub fn is_closed(&self) -> bool {
        self.handle.is_released()
    }

    /// Close the certificate. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        let api = self.instance.api();
        // SAFETY: release() only passes a live handle.
        self.handle.release(api, |raw| unsafe { api.certificate_close(raw) })
    }
}

impl Drop for Certificate<'_> {
    fn drop(&mut self) {
        log_drop_release("certificate", self.close());
    }
}

impl std::fmt::Debug for Certificate<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Certificate").field("handle", &self.handle).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockOtto, Op};

    #[test]
    fn test_from_location_url() {
        let source = CertificateSource::from_location(
            Some("http://127.0.0.1:24727/eID-Client"),
            Some("123456"),
        );
        assert_eq!(
            source,
            CertificateSource::EidClient {
                url: "http://127.0.0.1:24727/eID-Client".into()
            }
        );
        assert!(CertificateSource::from_location(Some("HTTPS://localhost"), None).is_eid_client());
    }

    #[test]
    fn test_from_location_path() {
        let source =
            CertificateSource::from_location(Some("test-softidnr-pse.pfx"), Some("123456"));
        assert_eq!(source, CertificateSource::file("test-softidnr-pse.pfx", "123456"));
    }

    #[test]
    fn test_from_location_null() {
        let source = CertificateSource::from_location(None, None);
        assert_eq!(
            source,
            CertificateSource::File {
                path: None,
                password: None
            }
        );
    }

    #[test]
    fn test_open_with_pin() {
        let mock = MockOtto::shared();
        mock.expect_password("123456");
        let instance = Instance::create(mock.clone(), None).unwrap();

        let mut cert = instance
            .open_certificate(&CertificateSource::file("test.pfx", "123456"))
            .unwrap();
        assert_eq!(mock.live_handles(), 2);

        cert.close().unwrap();
        cert.close().unwrap();
        assert_eq!(mock.calls(Op::CertificateClose), 1);
        assert_eq!(mock.live_handles(), 1);
    }

    #[test]
    fn test_wrong_pin() {
        let mock = MockOtto::shared();
        mock.expect_password("123456");
        let instance = Instance::create(mock.clone(), None).unwrap();

        let err = instance
            .open_certificate(&CertificateSource::file("test.pfx", "000000"))
            .unwrap_err();
        assert_eq!(err.status(), Some(crate::ffi::StatusCode(crate::testing::WRONG_PIN)));
        assert_eq!(mock.live_handles(), 1);
    }

    #[test]
    fn test_eid_client_passes_null_password() {
        let mock = MockOtto::shared();
        let instance = Instance::create(mock.clone(), None).unwrap();
        let _cert = instance
            .open_certificate(&CertificateSource::EidClient {
                url: "http://127.0.0.1:24727/eID-Client".into(),
            })
            .unwrap();
        assert_eq!(
            mock.last_certificate(),
            Some((Some("http://127.0.0.1:24727/eID-Client".to_string()), None))
        );
    }

    #[test]
    fn test_closed_instance_rejected() {
        let mock = MockOtto::shared();
        let mut instance = Instance::create(mock.clone(), None).unwrap();
        instance.close().unwrap();
        let err = Certificate::open(&instance, &CertificateSource::file("a.pfx", "1")).unwrap_err();
        assert!(err.is_misuse());
        assert_eq!(mock.calls(Op::CertificateOpen), 0);
    }
}
