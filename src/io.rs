use crate::IngestResult;
use async_compression::tokio::bufread::{GzipDecoder, ZstdDecoder};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncRead, BufReader};

/// Compression wrapped around the CSV bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    None,
    Gzip,
    Zstd,
}

impl Compression {
    /// Pick a codec from transport hints: content-encoding first, then
    /// content-type, then the file name.
    pub fn detect(content_encoding: &str, content_type: &str, name_hint: &str) -> Self {
        let ce = content_encoding.to_ascii_lowercase();
        let ct = content_type.to_ascii_lowercase();
        let encodings = || ce.split(',').map(str::trim);

        if encodings().any(|s| s == "gzip") {
            return Compression::Gzip;
        }
        if encodings().any(|s| s == "zstd") {
            return Compression::Zstd;
        }
        match ct.as_str() {
            "application/gzip" | "application/x-gzip" => return Compression::Gzip,
            "application/zstd" => return Compression::Zstd,
            _ => {}
        }
        if name_hint.ends_with(".gz") {
            Compression::Gzip
        } else if name_hint.ends_with(".zst") {
            Compression::Zstd
        } else {
            Compression::None
        }
    }
}

/// Wrap a raw byte source so the pipeline sees plain CSV text.
pub fn open_source<R>(raw: R, compression: Compression) -> Box<dyn AsyncRead + Unpin + Send>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    // Use a larger buffer for fewer syscalls (1 MiB)
    let buf = BufReader::with_capacity(1 << 20, raw);
    match compression {
        Compression::None => Box::new(buf),
        Compression::Gzip => Box::new(GzipDecoder::new(buf)),
        Compression::Zstd => Box::new(ZstdDecoder::new(buf)),
    }
}

/// Open a local file, choosing the codec from its extension.
pub async fn source_from_path(path: &Path) -> IngestResult<Box<dyn AsyncRead + Unpin + Send>> {
    let file = File::open(path).await?;
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    Ok(open_source(file, Compression::detect("", "", name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_precedence() {
        assert_eq!(Compression::detect("br, gzip", "", "x.zst"), Compression::Gzip);
        assert_eq!(Compression::detect("", "application/zstd", "x.gz"), Compression::Zstd);
        assert_eq!(Compression::detect("", "text/csv", "users.csv.gz"), Compression::Gzip);
        assert_eq!(Compression::detect("", "", "users.csv"), Compression::None);
    }
}
