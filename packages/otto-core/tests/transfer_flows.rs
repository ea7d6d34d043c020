//! End-to-end flows through the public API against the in-memory library.

use std::io::{self, Read, Write};
use std::sync::Arc;

use otto_core::testing::{MockOtto, Op, CHECKSUM_MISMATCH};
use otto_core::{
    CertificateSource, ChecksumStream, Error, Instance, ReceiveStream, SendStream, StatusCode,
};

const VENDOR_ID: &str = "74931";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "otto_core=debug".into()),
        )
        .try_init();
}

fn mock() -> Arc<MockOtto> {
    init_tracing();
    let mock = MockOtto::shared();
    mock.expect_password("123456");
    mock
}

#[test]
fn test_send_then_receive_round_trip() {
    let mock = mock();
    let instance = Instance::create(mock.clone(), None).unwrap();
    let cert = instance
        .open_certificate(&CertificateSource::file("test-softidnr-pse.pfx", "123456"))
        .unwrap();

    let mut checksum = ChecksumStream::open(&instance).unwrap();
    checksum.write_all(b"hello").unwrap();
    let signature = checksum.sign(&cert).unwrap();
    checksum.close().unwrap();

    let mut send = SendStream::begin(&instance, &signature, VENDOR_ID).unwrap();
    send.write_all(b"hello").unwrap();
    let object_id = send.finish().unwrap();
    send.close().unwrap();
    assert_eq!(object_id, "obj-42");

    let mut receive = ReceiveStream::open(&instance, &object_id, &cert, VENDOR_ID).unwrap();
    let mut received = Vec::new();
    receive.read_to_end(&mut received).unwrap();
    receive.close().unwrap();
    assert_eq!(received, b"hello");

    drop(receive);
    drop(send);
    drop(checksum);
    drop(cert);
    drop(instance);
    assert_eq!(mock.live_handles(), 0);
    assert_eq!(mock.double_releases(), 0);
}

#[test]
fn test_receive_blocks_five_three_zero() {
    let mock = mock();
    mock.store_object("obj-1", b"12345678".to_vec());
    mock.set_chunk_sizes(&[5, 3]);
    let instance = Instance::create(mock.clone(), None).unwrap();
    let cert = instance
        .open_certificate(&CertificateSource::file("test.pfx", "123456"))
        .unwrap();
    let mut receive = ReceiveStream::open(&instance, "obj-1", &cert, VENDOR_ID).unwrap();

    let mut total = Vec::new();
    let mut buf = [0u8; 3];
    loop {
        let n = receive.read(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        total.extend_from_slice(&buf[..n]);
    }
    assert_eq!(total.len(), 8);
    assert_eq!(total, b"12345678");
    let fetches = mock.calls(Op::ReceiveContinue);
    assert_eq!(fetches, 3);

    for _ in 0..5 {
        assert_eq!(receive.read(&mut buf).unwrap(), 0);
        assert_eq!(receive.read_byte().unwrap(), None);
    }
    assert_eq!(mock.calls(Op::ReceiveContinue), fetches);
}

#[test]
fn test_every_handle_closes_once() {
    let mock = mock();
    let mut instance = Instance::create(mock.clone(), None).unwrap();
    {
        let mut cert = instance
            .open_certificate(&CertificateSource::file("test.pfx", "123456"))
            .unwrap();

        let mut checksum = ChecksumStream::open(&instance).unwrap();
        checksum.close().unwrap();
        checksum.close().unwrap();

        let mut send = SendStream::begin(&instance, "sig", VENDOR_ID).unwrap();
        send.close().unwrap();
        send.close().unwrap();

        mock.store_object("obj-1", b"x".to_vec());
        {
            let mut receive = ReceiveStream::open(&instance, "obj-1", &cert, VENDOR_ID).unwrap();
            receive.close().unwrap();
            receive.close().unwrap();
        }

        cert.close().unwrap();
        cert.close().unwrap();
    }
    instance.close().unwrap();
    instance.close().unwrap();

    for op in [
        Op::InstanceRelease,
        Op::CertificateClose,
        Op::ChecksumRelease,
        Op::SendEnd,
        Op::ReceiveEnd,
    ] {
        assert_eq!(mock.calls(op), 1, "{:?}", op);
    }
    assert_eq!(mock.double_releases(), 0);
    assert_eq!(mock.live_handles(), 0);
}

#[test]
fn test_code_seven_surfaces_everywhere() {
    let mock = mock();
    mock.set_error_text(CHECKSUM_MISMATCH, "checksum mismatch");
    let instance = Instance::create(mock.clone(), None).unwrap();
    let cert = instance
        .open_certificate(&CertificateSource::file("test.pfx", "123456"))
        .unwrap();

    let assert_seven = |err: Error| {
        assert_eq!(err.status(), Some(StatusCode(7)));
        assert_eq!(err.code(), 7);
        assert_eq!(err.message(), Some("checksum mismatch"));
    };

    // Natural mismatch: data differs from what was signed.
    let mut send = SendStream::begin(&instance, "MOCKSIG-0000000000000000", VENDOR_ID).unwrap();
    send.write_all(b"hello").unwrap();
    assert_seven(send.finish().unwrap_err());
    drop(send);

    // Injected on update, seen through io::Write.
    mock.fail(Op::ChecksumUpdate, 7);
    let mut checksum = ChecksumStream::open(&instance).unwrap();
    assert_seven(Error::from_io(checksum.write_all(b"abc").unwrap_err()));
    drop(checksum);
    mock.clear_failure(Op::ChecksumUpdate);

    // Injected on receive, seen through io::Read.
    mock.store_object("obj-1", b"abc".to_vec());
    mock.fail(Op::ReceiveContinue, 7);
    let mut receive = ReceiveStream::open(&instance, "obj-1", &cert, VENDOR_ID).unwrap();
    let io_err = receive.read_to_end(&mut Vec::new()).unwrap_err();
    assert_eq!(io_err.kind(), io::ErrorKind::Other);
    assert_seven(Error::from_io(io_err));
}

#[test]
fn test_wrong_pin_leaves_no_handles() {
    let mock = mock();
    let instance = Instance::create(mock.clone(), None).unwrap();
    let err = instance
        .open_certificate(&CertificateSource::file("test.pfx", "654321"))
        .unwrap_err();
    assert!(err.status().is_some());
    drop(instance);
    assert_eq!(mock.live_handles(), 0);
}

#[test]
fn test_drop_releases_open_resources() {
    let mock = mock();
    mock.store_object("obj-1", b"payload".to_vec());
    {
        let instance = Instance::create(mock.clone(), None).unwrap();
        let cert = instance
            .open_certificate(&CertificateSource::file("test.pfx", "123456"))
            .unwrap();
        let mut receive = ReceiveStream::open(&instance, "obj-1", &cert, VENDOR_ID).unwrap();
        receive.read_byte().unwrap();
        let _checksum = ChecksumStream::open(&instance).unwrap();
        assert_eq!(mock.live_handles(), 5);
    }
    assert_eq!(mock.live_handles(), 0);
    assert_eq!(mock.double_releases(), 0);
}
