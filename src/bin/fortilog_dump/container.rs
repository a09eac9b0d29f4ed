//! Unwraps the compression container around an elog/tlog stream.
//!
//! Log files on disk are usually gzip (or, on newer firmware, zstd) compressed. The decoder
//! itself only deals with the decompressed stream, so containers are stripped here, by sniffing
//! the first bytes of the input.

use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use log::debug;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Large tlog archives are written with long-distance matching.
const ZSTD_WINDOW_LOG_MAX: u32 = 31;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Gzip,
    Zstd,
    Raw,
}

impl Container {
    pub fn sniff(data: &[u8]) -> Self {
        if data.starts_with(&GZIP_MAGIC) {
            Container::Gzip
        } else if data.starts_with(&ZSTD_MAGIC) {
            Container::Zstd
        } else {
            Container::Raw
        }
    }
}

/// Strips the container from `data`, returning the decompressed stream.
pub fn unwrap_container(data: Vec<u8>) -> Result<Vec<u8>> {
    let container = Container::sniff(&data);
    debug!("Input container: {:?} ({} bytes)", container, data.len());

    match container {
        Container::Raw => Ok(data),
        Container::Gzip => {
            let mut out = Vec::with_capacity(data.len() * 4);
            MultiGzDecoder::new(data.as_slice())
                .read_to_end(&mut out)
                .context("failed to decompress gzip container")?;
            Ok(out)
        }
        Container::Zstd => {
            let mut decoder = zstd::Decoder::new(data.as_slice())
                .context("failed to initialize zstd decoder")?;
            decoder
                .window_log_max(ZSTD_WINDOW_LOG_MAX)
                .context("failed to raise zstd window limit")?;

            let mut out = Vec::with_capacity(data.len() * 4);
            decoder
                .read_to_end(&mut out)
                .context("failed to decompress zstd container")?;
            Ok(out)
        }
    }
}

/// Reads `path` (or stdin for `-`) and strips its container.
pub fn read_input(path: &Path) -> Result<Vec<u8>> {
    let mut data = Vec::new();

    if path == Path::new("-") {
        io::stdin()
            .lock()
            .read_to_end(&mut data)
            .context("failed to read stdin")?;
    } else {
        File::open(path)
            .and_then(|mut f| f.read_to_end(&mut data))
            .with_context(|| format!("failed to read `{}`", path.display()))?;
    }

    unwrap_container(data)
}
