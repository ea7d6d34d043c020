//! # Send Session
//!
//! Push-based upload of an object to the OTTER server.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            SEND FLOW                                    │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  begin(signature, vendor id)                                            │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  write(block) ──► stage into scratch ──► send_continue(block)   (n×)    │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  finish() ──► fresh ReturnBuffer ──► send_finalize ──► object id        │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  close() ──► release scratch ──► send_end                               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::io::{self, Write};

use crate::error::{check, Error, Result};
use crate::ffi::to_cstring;
use crate::handle::{log_drop_release, NativeHandle, SendKind};
use crate::instance::Instance;
use crate::return_buffer::fetch_text;
use crate::transfer::{self, TransferBuffer};

/// An open send session.
pub struct SendStream<'i> {
    instance: &'i Instance,
    handle: NativeHandle<SendKind>,
    scratch: Option<TransferBuffer>,
    finished: bool,
    bytes_sent: u64,
}

impl<'i> SendStream<'i> {
    /// Begin a send session for data whose signed checksum is `signed_checksum`.
    pub fn begin(instance: &'i Instance, signed_checksum: &str, vendor_id: &str) -> Result<Self> {
        let raw_instance = instance.raw()?;
        let signed_checksum = to_cstring(signed_checksum, "signed checksum")?;
        let vendor_id = to_cstring(vendor_id, "vendor id")?;

        let api = instance.api();
        // SAFETY: raw_instance is live while `instance` is open.
        let handle = NativeHandle::open(api, |slot| unsafe {
            api.send_begin(raw_instance, &signed_checksum, &vendor_id, slot)
        })?;

        tracing::info!("Send session started");
        Ok(Self {
            instance,
            handle,
            scratch: None,
            finished: false,
            bytes_sent: 0,
        })
    }

    /// Push the next block.
    pub fn send(&mut self, block: &[u8]) -> Result<()> {
        if self.finished {
            return Err(Error::AlreadyFinished);
        }
        let raw = self.handle.get()?;
        if block.is_empty() {
            return Ok(());
        }
        let api = self.instance.api();
        let staged = transfer::stage(&mut self.scratch, block);
        // SAFETY: raw is live; `staged` is valid for the call.
        check(api, unsafe { api.send_continue(raw, staged) })?;
        self.bytes_sent += block.len() as u64;
        Ok(())
    }

    /// Push a single byte.
    pub fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.send(&[byte])
    }

    /// Complete the upload and return the object id assigned by the server.
    ///
    /// Can be called once; a second call fails with [`Error::AlreadyFinished`].
    pub fn finish(&mut self) -> Result<String> {
        if self.finished {
            return Err(Error::AlreadyFinished);
        }
        let raw = self.handle.get()?;
        let api = self.instance.api();

        // SAFETY: raw and the buffer are live for the call.
        let object_id =
            fetch_text(self.instance, |buffer| unsafe { api.send_finalize(raw, buffer) })?;
        self.finished = true;

        tracing::info!(%object_id, bytes = self.bytes_sent, "Send session finalized");
        Ok(object_id)
    }

    /// Total bytes pushed so far.
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// Whether `finish` has succeeded.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Release the scratch buffer, then end the session.
    pub fn close(&mut self) -> Result<()> {
        transfer::release(&mut self.scratch);
        let api = self.instance.api();
        // SAFETY: release() only passes a live handle.
        self.handle.release(api, |raw| unsafe { api.send_end(raw) })
    }
}

impl Write for SendStream<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.send(buf).map_err(Error::into_io)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for SendStream<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendStream")
            .field("handle", &self.handle)
            .field("finished", &self.finished)
            .field("bytes_sent", &self.bytes_sent)
            .finish()
    }
}

impl Drop for SendStream<'_> {
    fn drop(&mut self) {
        log_drop_release("send", self.close());
    }
}
