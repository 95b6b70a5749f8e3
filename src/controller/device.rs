//! Non-blocking HID gadget character device.
//!
//! The device is opened `O_NONBLOCK | O_SYNC` and polled through the tokio
//! reactor. A pending read is an ordinary future: dropping it leaves nothing
//! behind on the blocking pool, and the descriptor closes as soon as the last
//! half is dropped.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::io::unix::AsyncFd;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tracing::debug;

#[derive(Debug)]
pub struct HidDevice {
    fd: AsyncFd<File>,
}

impl HidDevice {
    /// Opens `path` read/write. Fails for files the reactor cannot poll,
    /// such as regular files.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK | libc::O_SYNC)
            .open(path)?;
        debug!("Opened {} non-blocking", path.display());
        Ok(Self {
            fd: AsyncFd::new(file)?,
        })
    }
}

impl AsyncRead for HidDevice {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        loop {
            let mut guard = ready!(self.fd.poll_read_ready(cx))?;
            let unfilled = buf.initialize_unfilled();
            match guard.try_io(|inner| inner.get_ref().read(unfilled)) {
                Ok(Ok(n)) => {
                    buf.advance(n);
                    return Poll::Ready(Ok(()));
                }
                Ok(Err(e)) => return Poll::Ready(Err(e)),
                Err(_would_block) => continue,
            }
        }
    }
}

impl AsyncWrite for HidDevice {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        loop {
            let mut guard = ready!(self.fd.poll_write_ready(cx))?;
            match guard.try_io(|inner| inner.get_ref().write(buf)) {
                Ok(result) => return Poll::Ready(result),
                Err(_would_block) => continue,
            }
        }
    }

    // O_SYNC: a completed write is already on the device.
    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn fifo(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("hidg");
        let c_path = CString::new(path.as_os_str().as_bytes()).unwrap();
        assert_eq!(unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) }, 0);
        path
    }

    #[tokio::test]
    async fn regular_files_are_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(HidDevice::open(file.path()).is_err());
    }

    #[tokio::test]
    async fn pending_read_can_be_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let mut device = HidDevice::open(&fifo(&dir)).unwrap();

        let mut buf = [0u8; 8];
        let pending =
            tokio::time::timeout(std::time::Duration::from_millis(50), device.read(&mut buf)).await;
        assert!(pending.is_err());

        device.write_all(&[0x80, 0x01]).await.unwrap();
        let n = device.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], &[0x80, 0x01]);
    }
}
