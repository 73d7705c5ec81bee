use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::unix::AsyncFd;

use crate::config::{DeviceKind, DeviceSpec};
use crate::error::DeviceError;
use crate::traits::{Device, DeviceStats};

/// A tap character device carrying Ethernet frames.
///
/// The device is opened non-blocking and polled through the reactor, so a
/// read waiting for traffic never holds up a write.
pub struct TapDevice {
    path: PathBuf,
    interface: String,
    mtu: usize,
    fd: Option<AsyncFd<File>>,
    stats: DeviceStats,
}

impl TapDevice {
    pub async fn open(spec: &DeviceSpec) -> Result<Self, DeviceError> {
        let open_error = |source| DeviceError::Open {
            path: spec.path.clone(),
            source,
        };
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(&spec.path)
            .map_err(open_error)?;
        let fd = AsyncFd::new(file).map_err(open_error)?;

        // The OS names the interface after the node the path resolves to.
        let realname = tokio::fs::canonicalize(&spec.path)
            .await
            .unwrap_or_else(|_| spec.path.clone());
        let derived = interface_name(&realname);

        let interface = match &spec.interface {
            Some(configured) => {
                if configured != &derived {
                    tracing::warn!(
                        configured = %configured,
                        device = %derived,
                        "interface does not match device, $INTERFACE might be set incorrectly"
                    );
                }
                configured.clone()
            }
            None => derived,
        };

        tracing::info!(
            device = %spec.path.display(),
            interface = %interface,
            mtu = spec.mtu,
            "opened tap device"
        );

        Ok(Self {
            path: spec.path.clone(),
            interface,
            mtu: spec.mtu,
            fd: Some(fd),
            stats: DeviceStats::default(),
        })
    }

    fn handle(&self) -> Result<&AsyncFd<File>, DeviceError> {
        self.fd
            .as_ref()
            .ok_or_else(|| DeviceError::NotOpen(self.path.clone()))
    }
}

fn interface_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

#[async_trait]
impl Device for TapDevice {
    async fn read(&mut self) -> Result<Vec<u8>, DeviceError> {
        let read_error = |source| DeviceError::Read {
            path: self.path.clone(),
            source,
        };
        let fd = self.handle()?;
        let mut frame = vec![0u8; self.mtu];

        let len = loop {
            let mut ready = fd.readable().await.map_err(read_error)?;
            match ready.try_io(|inner| inner.get_ref().read(&mut frame)) {
                Ok(result) => break result.map_err(read_error)?,
                Err(_would_block) => continue,
            }
        };
        if len == 0 {
            return Err(read_error(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "device returned no data",
            )));
        }

        frame.truncate(len);
        self.stats.bytes_in += len as u64;
        tracing::trace!(bytes = len, device = %self.path.display(), "read frame");
        Ok(frame)
    }

    async fn write(&mut self, frame: &[u8]) -> Result<(), DeviceError> {
        tracing::trace!(bytes = frame.len(), device = %self.path.display(), "writing frame");
        let write_error = |source| DeviceError::Write {
            path: self.path.clone(),
            source,
        };
        let fd = self.handle()?;

        let mut written = 0;
        while written < frame.len() {
            let mut ready = fd.writable().await.map_err(write_error)?;
            match ready.try_io(|inner| inner.get_ref().write(&frame[written..])) {
                Ok(Ok(0)) => {
                    return Err(write_error(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "device accepted no data",
                    )));
                }
                Ok(result) => written += result.map_err(write_error)?,
                Err(_would_block) => continue,
            }
        }
        self.stats.bytes_out += frame.len() as u64;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DeviceError> {
        if self.fd.take().is_none() {
            return Ok(());
        }
        tracing::debug!(
            device = %self.path.display(),
            bytes_in = self.stats.bytes_in,
            bytes_out = self.stats.bytes_out,
            "tap device statistics"
        );
        Ok(())
    }

    fn stats(&self) -> DeviceStats {
        self.stats
    }

    fn interface(&self) -> &str {
        &self.interface
    }

    fn kind(&self) -> DeviceKind {
        DeviceKind::Tap
    }

    fn path(&self) -> &Path {
        &self.path
    }
}
