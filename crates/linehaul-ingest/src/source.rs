//! Input source handling
//!
//! Opens a JSONL path as an async byte stream for the decoder. Plain files
//! are streamed through a buffered reader; `.gz` files are decompressed up
//! front on a blocking worker. Also provides SHA-256 checksums of input
//! files for run logs and verification.

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use sha2::{Digest, Sha256};
use std::io::{Cursor, Read};
use std::path::Path;
use tokio::io::{AsyncRead, BufReader};
use tracing::debug;

/// A readable, decompressed JSONL byte stream.
pub type SourceReader = Box<dyn AsyncRead + Unpin + Send>;

/// Open a JSONL file for decoding, transparently handling `.gz` inputs.
pub async fn open_source(path: &Path) -> Result<SourceReader> {
    if path.extension().is_some_and(|ext| ext == "gz") {
        let compressed = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let decompressed =
            tokio::task::spawn_blocking(move || decompress_gzip(&compressed))
                .await
                .context("Decompression task panicked")??;

        Ok(Box::new(Cursor::new(decompressed)))
    } else {
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;

        Ok(Box::new(BufReader::new(file)))
    }
}

/// Decompress gzip-compressed data.
pub fn decompress_gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .context("Failed to decompress gzip data")?;
    debug!("Decompressed {} -> {} bytes", data.len(), decompressed.len());
    Ok(decompressed)
}

/// SHA-256 checksum of a file, hex-encoded.
pub async fn file_sha256(path: &Path) -> Result<String> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let mut file = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;

        let mut hasher = Sha256::new();
        let mut buffer = [0u8; 8192];
        loop {
            let bytes_read = file.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(hex::encode(hasher.finalize()))
    })
    .await
    .context("Checksum task panicked")?
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tokio::io::AsyncReadExt;

    fn gzip(content: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(content).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_decompress_gzip_round_trip() {
        let original = b"{\"id\":1}\n{\"id\":2}\n";
        assert_eq!(decompress_gzip(&gzip(original)).unwrap(), original);
    }

    #[test]
    fn test_decompress_gzip_rejects_garbage() {
        assert!(decompress_gzip(b"not gzip data").is_err());
    }

    #[tokio::test]
    async fn test_open_source_handles_gz_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.jsonl.gz");
        std::fs::write(&path, gzip(b"{\"id\":1}\n")).unwrap();

        let mut reader = open_source(&path).await.unwrap();
        let mut contents = String::new();
        reader.read_to_string(&mut contents).await.unwrap();
        assert_eq!(contents, "{\"id\":1}\n");
    }

    #[tokio::test]
    async fn test_file_sha256_known_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, b"hello world").unwrap();

        let digest = file_sha256(&path).await.unwrap();
        assert_eq!(
            digest,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }
}
