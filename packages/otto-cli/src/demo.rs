//! The send and receive flows.

use std::fs::{self, File};
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use color_eyre::eyre::{bail, Result, WrapErr};
use otto_core::{
    Certificate, ChecksumStream, Instance, OttoApi, ReceiveStream, SendStream, TracingLogSink,
};

use crate::args::{DemoConfig, Mode};

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Object id assigned to the uploaded file
    Sent { object_id: String },
    /// Number of bytes written to the target file
    Received { bytes: u64 },
}

/// Run the demo against `api`.
///
/// `input` is read when the vendor id has to be prompted for; progress
/// goes to `out`.
pub fn run(
    api: Arc<dyn OttoApi>,
    config: &DemoConfig,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> Result<Outcome> {
    let sink = Arc::new(TracingLogSink);
    let mut instance = Instance::create_with_log_sink(api, Some(config.log_dir.as_path()), sink)
        .wrap_err("Could not create Otto instance")?;
    tracing::debug!(version = ?instance.library_version().ok(), "Otto library ready");

    let outcome = run_with_instance(&instance, config, input, out);
    let closed = instance.close().wrap_err("Could not release Otto instance");
    finish_scope(outcome, closed)
}

fn run_with_instance(
    instance: &Instance,
    config: &DemoConfig,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> Result<Outcome> {
    if let Some(proxy) = &config.proxy {
        instance
            .set_proxy(Some(proxy))
            .wrap_err("Could not configure proxy")?;
    }

    let mut certificate = instance
        .open_certificate(&config.certificate)
        .wrap_err("Could not open certificate")?;

    let outcome = transfer(instance, &certificate, config, input, out);
    let closed = certificate.close().wrap_err("Could not close certificate");
    finish_scope(outcome, closed)
}

fn transfer(
    instance: &Instance,
    certificate: &Certificate<'_>,
    config: &DemoConfig,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> Result<Outcome> {
    let vendor_id = match &config.vendor_id {
        Some(id) => id.clone(),
        None => prompt_vendor_id(input, out)?,
    };

    match &config.mode {
        Mode::Send { source } => send_file(instance, certificate, source, &vendor_id, out),
        Mode::Receive { object_id, target } => {
            receive_file(instance, certificate, object_id, target, &vendor_id, out)
        }
    }
}

/// Combine a step's outcome with its cleanup; a cleanup failure wins.
fn finish_scope<T>(body: Result<T>, cleanup: Result<()>) -> Result<T> {
    match (body, cleanup) {
        (body, Ok(())) => body,
        (Ok(_), Err(cleanup)) => Err(cleanup),
        (Err(body), Err(cleanup)) => {
            tracing::debug!(error = ?body, "Error superseded by cleanup failure");
            Err(cleanup)
        }
    }
}

/// Ask for the vendor id on `input`.
pub fn prompt_vendor_id(input: &mut impl BufRead, out: &mut impl Write) -> Result<String> {
    write!(out, "Please enter your vendor id: ")?;
    out.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    writeln!(out)?;

    let vendor_id = line.trim();
    if vendor_id.is_empty() {
        bail!("A vendor id is required");
    }
    Ok(vendor_id.to_string())
}

/// Checksum, sign and upload `source`.
pub fn send_file(
    instance: &Instance,
    certificate: &Certificate<'_>,
    source: &Path,
    vendor_id: &str,
    out: &mut impl Write,
) -> Result<Outcome> {
    writeln!(out, "*** Sending file to OTTER ***")?;

    if source.exists() && !source.is_file() {
        bail!("{} is not a regular file", source.display());
    }

    writeln!(out, "Creating signed checksum.")?;
    let signature = {
        let mut file = open_source(source)?;
        let mut checksum = ChecksumStream::open(instance)?;
        io::copy(&mut file, &mut checksum).wrap_err("Checksum calculation failed")?;
        let signature = checksum.sign(certificate).wrap_err("Signing the checksum failed")?;
        checksum.close()?;
        signature
    };
    writeln!(out, "Checksum created and signed.")?;

    writeln!(out, "Sending data")?;
    let mut file = open_source(source)?;
    let mut send = SendStream::begin(instance, &signature, vendor_id)?;
    io::copy(&mut file, &mut send).wrap_err("Upload failed")?;
    let object_id = send.finish().wrap_err("Finalizing the upload failed")?;
    send.close()?;

    writeln!(out, "Upload successful: object id = {}", object_id)?;
    tracing::info!(%object_id, bytes = send.bytes_sent(), "File sent");
    Ok(Outcome::Sent { object_id })
}

fn open_source(source: &Path) -> Result<File> {
    File::open(source).wrap_err_with(|| format!("Cannot read from {}", source.display()))
}

/// Fetch `object_id` into `target`, replacing its contents.
pub fn receive_file(
    instance: &Instance,
    certificate: &Certificate<'_>,
    object_id: &str,
    target: &Path,
    vendor_id: &str,
    out: &mut impl Write,
) -> Result<Outcome> {
    writeln!(out, "*** Fetching file from OTTER ***")?;
    writeln!(out, "Object id: {}", object_id)?;

    if target.exists() {
        let metadata = fs::metadata(target)?;
        if !metadata.is_file() {
            bail!("{} is not a regular file", target.display());
        }
        if metadata.permissions().readonly() {
            bail!("{} is not writable", target.display());
        }
    }

    writeln!(out, "Saving data to: {}", target.display())?;
    let mut receive = ReceiveStream::open(instance, object_id, certificate, vendor_id)?;
    let mut file = File::create(target)
        .wrap_err_with(|| format!("Cannot write to {}", target.display()))?;

    write!(out, "Receiving data ")?;
    let bytes = io::copy(&mut receive, &mut file)
        .map_err(otto_core::Error::from_io)
        .wrap_err("Download failed")?;
    file.flush()?;
    receive.close()?;

    writeln!(out, "{} bytes fetched successfully.", bytes)?;
    Ok(Outcome::Received { bytes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::DEFAULT_OBJECT_ID;
    use otto_core::testing::{MockOtto, Op};
    use otto_core::CertificateSource;
    use std::io::Cursor;
    use std::path::PathBuf;

    fn config(mode: Mode, log_dir: &Path) -> DemoConfig {
        DemoConfig {
            mode,
            certificate: CertificateSource::file("test-softidnr-pse.pfx", "123456"),
            lib_dir: PathBuf::from("."),
            log_dir: log_dir.to_path_buf(),
            vendor_id: Some("74931".into()),
            proxy: None,
        }
    }

    #[test]
    fn test_send_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("daten.xml");
        fs::write(&source, b"<daten>hello</daten>").unwrap();

        let mock = MockOtto::shared();
        mock.expect_password("123456");
        let mut out = Vec::new();
        let outcome = run(
            mock.clone(),
            &config(Mode::Send { source }, dir.path()),
            &mut Cursor::new(Vec::new()),
            &mut out,
        )
        .unwrap();

        assert_eq!(
            outcome,
            Outcome::Sent {
                object_id: "obj-42".into()
            }
        );
        assert_eq!(mock.object("obj-42"), Some(b"<daten>hello</daten>".to_vec()));
        assert!(String::from_utf8(out).unwrap().contains("object id = obj-42"));
        assert_eq!(mock.live_handles(), 0);
    }

    #[test]
    fn test_receive_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("beispiel.xml");
        fs::write(&target, b"old contents that are longer").unwrap();

        let mock = MockOtto::shared();
        mock.store_object(DEFAULT_OBJECT_ID, b"<antwort/>".to_vec());
        mock.set_chunk_sizes(&[4, 4]);
        let mut out = Vec::new();
        let outcome = run(
            mock.clone(),
            &config(
                Mode::Receive {
                    object_id: DEFAULT_OBJECT_ID.into(),
                    target: target.clone(),
                },
                dir.path(),
            ),
            &mut Cursor::new(Vec::new()),
            &mut out,
        )
        .unwrap();

        assert_eq!(outcome, Outcome::Received { bytes: 10 });
        assert_eq!(fs::read(&target).unwrap(), b"<antwort/>");
        assert_eq!(mock.live_handles(), 0);
    }

    #[test]
    fn test_receive_into_directory_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockOtto::shared();
        let err = run(
            mock.clone(),
            &config(
                Mode::Receive {
                    object_id: "obj-1".into(),
                    target: dir.path().to_path_buf(),
                },
                dir.path(),
            ),
            &mut Cursor::new(Vec::new()),
            &mut Vec::new(),
        )
        .unwrap_err();

        assert!(err.to_string().contains("not a regular file"));
        assert_eq!(mock.calls(Op::ReceiveBegin), 0);
        assert_eq!(mock.live_handles(), 0);
    }

    #[test]
    fn test_vendor_id_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("daten.xml");
        fs::write(&source, b"abc").unwrap();

        let mock = MockOtto::shared();
        let mut cfg = config(Mode::Send { source }, dir.path());
        cfg.vendor_id = None;
        let mut out = Vec::new();
        run(mock, &cfg, &mut Cursor::new(b"74931\n".to_vec()), &mut out).unwrap();

        assert!(String::from_utf8(out).unwrap().starts_with("Please enter your vendor id: "));
    }

    #[test]
    fn test_prompt_rejects_empty() {
        let err = prompt_vendor_id(&mut Cursor::new(b"\n".to_vec()), &mut Vec::new()).unwrap_err();
        assert!(err.to_string().contains("vendor id"));
    }

    #[test]
    fn test_unknown_object_reports_native_error() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockOtto::shared();
        mock.set_error_text(otto_core::testing::UNKNOWN_OBJECT, "object not found");
        let err = run(
            mock.clone(),
            &config(
                Mode::Receive {
                    object_id: "obj-404".into(),
                    target: dir.path().join("out.xml"),
                },
                dir.path(),
            ),
            &mut Cursor::new(Vec::new()),
            &mut Vec::new(),
        )
        .unwrap_err();

        let native = err.downcast_ref::<otto_core::Error>().unwrap();
        assert_eq!(native.message(), Some("object not found"));
        assert_eq!(mock.live_handles(), 0);
    }

    #[test]
    fn test_certificate_close_failure_wins_over_body_error() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockOtto::shared();
        mock.set_error_text(otto_core::testing::UNKNOWN_OBJECT, "object not found");
        mock.set_error_text(30, "certificate close failed");
        mock.fail(Op::CertificateClose, 30);
        let err = run(
            mock.clone(),
            &config(
                Mode::Receive {
                    object_id: "obj-404".into(),
                    target: dir.path().join("out.xml"),
                },
                dir.path(),
            ),
            &mut Cursor::new(Vec::new()),
            &mut Vec::new(),
        )
        .unwrap_err();

        assert!(err.to_string().contains("Could not close certificate"));
        assert!(err.chain().any(|e| e.to_string().contains("certificate close failed")));
        assert!(!err.chain().any(|e| e.to_string().contains("object not found")));
        assert_eq!(mock.calls(Op::InstanceRelease), 1);
    }

    #[test]
    fn test_instance_released_after_body_error() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockOtto::shared();
        mock.set_error_text(31, "instance release failed");
        mock.fail(Op::InstanceRelease, 31);
        let err = run(
            mock.clone(),
            &config(
                Mode::Receive {
                    object_id: "obj-404".into(),
                    target: dir.path().join("out.xml"),
                },
                dir.path(),
            ),
            &mut Cursor::new(Vec::new()),
            &mut Vec::new(),
        )
        .unwrap_err();

        assert!(err.to_string().contains("Could not release Otto instance"));
        assert_eq!(mock.calls(Op::CertificateClose), 1);
        assert_eq!(mock.calls(Op::InstanceRelease), 1);
    }

    #[test]
    fn test_proxy_applied() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("daten.xml");
        fs::write(&source, b"abc").unwrap();

        let mock = MockOtto::shared();
        let mut cfg = config(Mode::Send { source }, dir.path());
        cfg.proxy = Some(otto_core::ProxyConfig::new("proxy.local:3128"));
        run(mock.clone(), &cfg, &mut Cursor::new(Vec::new()), &mut Vec::new()).unwrap();

        assert_eq!(mock.proxy().map(|p| p.url), Some("proxy.local:3128".into()));
    }
}
