//! Command-line arguments and their resolution into a [`DemoConfig`].

use std::path::PathBuf;

use clap::Parser;
use otto_core::{CertificateSource, ProxyConfig};

/// Passing this for `--cert` or `--pin` hands a null pointer to the library.
pub const NULL_SENTINEL: &str = "_NULL";

/// Object fetched when none is given
pub const DEFAULT_OBJECT_ID: &str = "7090bc69-be5e-4fd0-b91a-2128021295d6";

#[cfg(windows)]
const DEFAULT_LIB_DIR: &str = "../../dll";
#[cfg(not(windows))]
const DEFAULT_LIB_DIR: &str = "../../lib";

// ── CLI Arguments ─────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "ottodemo",
    version,
    about = "Send a file to OTTER or fetch an object from it through the Otto library"
)]
pub struct Args {
    /// Send <FILE> to OTTER
    #[arg(short, long, value_name = "FILE", conflicts_with_all = ["receive", "object_id"])]
    pub send: Option<PathBuf>,

    /// Write the fetched object to <FILE>
    #[arg(short = 'e', long, value_name = "FILE", default_value = "beispiel.xml")]
    pub receive: PathBuf,

    /// Id of the object to fetch
    #[arg(short, long, default_value = DEFAULT_OBJECT_ID)]
    pub object_id: String,

    /// Certificate file, or eID client URL (http:// or https://); _NULL for none
    #[arg(short, long, default_value = "test-softidnr-pse.pfx", env = "OTTO_CERT")]
    pub cert: String,

    /// Certificate PIN; _NULL for none
    #[arg(short, long, default_value = "123456", env = "OTTO_PIN", hide_env_values = true)]
    pub pin: String,

    /// Directory containing the Otto library
    #[arg(short = 'd', long, default_value = DEFAULT_LIB_DIR, env = "OTTO_LIB_DIR")]
    pub lib_dir: PathBuf,

    /// Directory for otto.log
    #[arg(short, long, default_value = ".", env = "OTTO_LOG_DIR")]
    pub log_dir: PathBuf,

    /// Vendor id assigned by ELSTER; prompted for when missing
    #[arg(short = 'i', long, env = "OTTO_VENDOR_ID")]
    pub vendor_id: Option<String>,

    /// Proxy address (host:port)
    #[arg(long, env = "OTTO_PROXY_URL")]
    pub proxy_url: Option<String>,

    /// Proxy user name
    #[arg(long, env = "OTTO_PROXY_USER", requires = "proxy_url")]
    pub proxy_user: Option<String>,

    /// Proxy password
    #[arg(long, env = "OTTO_PROXY_PASSWORD", requires = "proxy_url", hide_env_values = true)]
    pub proxy_password: Option<String>,

    /// Proxy authentication method (Basic, Digest, NTLM, ...)
    #[arg(long, env = "OTTO_PROXY_AUTH", requires = "proxy_url")]
    pub proxy_auth: Option<String>,
}

// ── Resolved Configuration ────────────────────────────────────────────────────

/// What the demo does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Upload a file
    Send {
        /// File to upload
        source: PathBuf,
    },
    /// Download an object
    Receive {
        /// Object to fetch
        object_id: String,
        /// File to write
        target: PathBuf,
    },
}

/// Fully resolved demo settings.
#[derive(Debug, Clone)]
pub struct DemoConfig {
    pub mode: Mode,
    pub certificate: CertificateSource,
    pub lib_dir: PathBuf,
    pub log_dir: PathBuf,
    pub vendor_id: Option<String>,
    pub proxy: Option<ProxyConfig>,
}

fn nullable(value: &str) -> Option<&str> {
    (!value.eq_ignore_ascii_case(NULL_SENTINEL)).then_some(value)
}

impl Args {
    /// Resolve sentinels, the certificate source and the mode.
    pub fn into_config(self) -> DemoConfig {
        let certificate =
            CertificateSource::from_location(nullable(&self.cert), nullable(&self.pin));

        let mode = match self.send {
            Some(source) => Mode::Send { source },
            None => Mode::Receive {
                object_id: self.object_id,
                target: self.receive,
            },
        };

        let proxy = self.proxy_url.map(|url| ProxyConfig {
            url,
            user_name: self.proxy_user,
            password: self.proxy_password,
            auth_method: self.proxy_auth,
        });

        DemoConfig {
            mode,
            certificate,
            lib_dir: self.lib_dir,
            log_dir: self.log_dir,
            vendor_id: self.vendor_id.filter(|id| !id.trim().is_empty()),
            proxy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("ottodemo").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults_receive() {
        let config = parse(&[]).unwrap().into_config();
        assert_eq!(
            config.mode,
            Mode::Receive {
                object_id: DEFAULT_OBJECT_ID.into(),
                target: PathBuf::from("beispiel.xml"),
            }
        );
        assert_eq!(
            config.certificate,
            CertificateSource::file("test-softidnr-pse.pfx", "123456")
        );
        assert!(config.proxy.is_none());
    }

    #[test]
    fn test_send_mode() {
        let config = parse(&["-s", "daten.xml", "-i", "74931"]).unwrap().into_config();
        assert_eq!(
            config.mode,
            Mode::Send {
                source: PathBuf::from("daten.xml")
            }
        );
        assert_eq!(config.vendor_id.as_deref(), Some("74931"));
    }

    #[test]
    fn test_send_conflicts_with_receive() {
        let err = parse(&["-s", "a.xml", "-e", "b.xml"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_send_conflicts_with_object_id() {
        let err = parse(&["--send", "a.xml", "--object-id", "obj-1"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_null_sentinel() {
        let config = parse(&["-c", "_NULL", "-p", "_null"]).unwrap().into_config();
        assert_eq!(
            config.certificate,
            CertificateSource::File {
                path: None,
                password: None
            }
        );
    }

    #[test]
    fn test_eid_url() {
        let config = parse(&["-c", "http://127.0.0.1:24727/eID-Client"]).unwrap().into_config();
        assert!(config.certificate.is_eid_client());
    }

    #[test]
    fn test_proxy_flags() {
        let config = parse(&[
            "--proxy-url",
            "proxy.local:3128",
            "--proxy-user",
            "alice",
            "--proxy-auth",
            "NTLM",
        ])
        .unwrap()
        .into_config();
        let proxy = config.proxy.unwrap();
        assert_eq!(proxy.url, "proxy.local:3128");
        assert_eq!(proxy.user_name.as_deref(), Some("alice"));
        assert_eq!(proxy.auth_method.as_deref(), Some("NTLM"));
        assert!(proxy.password.is_none());
    }

    #[test]
    fn test_proxy_user_requires_url() {
        let err = parse(&["--proxy-user", "alice"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_blank_vendor_id_is_missing() {
        let config = parse(&["-i", "  "]).unwrap().into_config();
        assert!(config.vendor_id.is_none());
    }
}
