use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::error::AssemblyError;
use crate::segment::Segment;

/// Writes the segment buffers to `path` one after another.
///
/// The file is created or truncated. Segments must be in index order and
/// contiguous from offset 0, since nothing is seeked; this is checked before
/// the file is touched. A failed write leaves whatever was written in place.
pub async fn write_segments(path: &Path, segments: &[Segment]) -> Result<u64, AssemblyError> {
    check_order(segments)?;

    let file = File::create(path)
        .await
        .map_err(|source| AssemblyError::Create {
            path: path.to_path_buf(),
            source,
        })?;
    let mut writer = BufWriter::new(file);
    let write_err = |source| AssemblyError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut written: u64 = 0;
    for segment in segments {
        writer.write_all(&segment.buffer).await.map_err(write_err)?;
        written += segment.buffer.len() as u64;
    }
    writer.flush().await.map_err(write_err)?;

    Ok(written)
}

fn check_order(segments: &[Segment]) -> Result<(), AssemblyError> {
    let mut next_offset = 0u64;
    for (expected_index, segment) in segments.iter().enumerate() {
        if segment.index != expected_index || segment.start != next_offset {
            return Err(AssemblyError::OutOfOrder {
                expected_index,
                found_index: segment.index,
            });
        }
        next_offset = segment.end + 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::plan;

    fn filled(total: u64, count: usize, source: &[u8]) -> Vec<Segment> {
        let mut segments = plan(total, count).unwrap();
        for seg in &mut segments {
            seg.buffer
                .copy_from_slice(&source[seg.start as usize..=seg.end as usize]);
        }
        segments
    }

    #[tokio::test]
    async fn test_write_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let source: Vec<u8> = (0..=255u8).cycle().take(1000).collect();

        let written = write_segments(&path, &filled(1000, 4, &source))
            .await
            .unwrap();

        assert_eq!(written, 1000);
        assert_eq!(tokio::fs::read(&path).await.unwrap(), source);
    }

    #[tokio::test]
    async fn test_truncates_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        tokio::fs::write(&path, vec![b'x'; 4096]).await.unwrap();

        write_segments(&path, &filled(5, 1, b"hello")).await.unwrap();

        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_rejects_out_of_order_segments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let mut segments = filled(10, 3, b"0123456789");
        segments.swap(0, 1);

        let err = write_segments(&path, &segments).await.unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::OutOfOrder {
                expected_index: 0,
                found_index: 1
            }
        ));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_create_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.bin");

        let err = write_segments(&path, &filled(5, 1, b"hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, AssemblyError::Create { .. }));
    }
}
