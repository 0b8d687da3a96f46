use std::io::Read;
use std::path::{Path, PathBuf};

/// Buffer size for hashing (128KB)
const BUFFER_SIZE: usize = 128 * 1024;

/// Size and BLAKE3 digest of a finished artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigest {
    pub size_bytes: u64,
    pub hex: String,
}

/// Hash a file on a blocking thread, streaming in chunks to handle large archives.
pub async fn digest_file(path: &Path) -> std::io::Result<FileDigest> {
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || digest_file_sync(&path))
        .await
        .map_err(std::io::Error::other)?
}

fn digest_file_sync(path: &Path) -> std::io::Result<FileDigest> {
    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::with_capacity(BUFFER_SIZE, file);
    let mut hasher = blake3::Hasher::new();
    let mut size_bytes: u64 = 0;

    let mut buffer = vec![0u8; BUFFER_SIZE];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        size_bytes += bytes_read as u64;
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(FileDigest {
        size_bytes,
        hex: hasher.finalize().to_hex().to_string(),
    })
}
