//! Section listings and write-back verification

use rw4_common::{Model, ReadOptions, Result, type_code};

/// One line per section: `#n 0xpos - 0xend: 0xtype Kind`
pub fn section_listing(model: &Model) -> Vec<String> {
    model
        .sections()
        .map(|(_, s)| {
            format!(
                "#{} 0x{:x} - 0x{:x}: 0x{:x} {}",
                s.number(),
                s.position,
                s.end(),
                s.type_code,
                type_code::name(s.type_code)
            )
        })
        .collect()
}

/// Result of re-encoding a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Identical,
    /// First offset where the re-encoded bytes differ (or one side ends)
    Differs { offset: usize, original: usize, written: usize },
}

/// First offset where `a` and `b` differ, counting a length mismatch
fn first_difference(a: &[u8], b: &[u8]) -> Option<usize> {
    a.iter()
        .zip(b)
        .position(|(x, y)| x != y)
        .or_else(|| (a.len() != b.len()).then(|| a.len().min(b.len())))
}

/// Read `data`, write it back and compare
pub fn verify(data: &[u8], options: ReadOptions) -> Result<Verification> {
    let written = Model::read_with(data, options)?.to_bytes()?;
    Ok(match first_difference(data, &written) {
        None => Verification::Identical,
        Some(offset) => Verification::Differs {
            offset,
            original: data.len(),
            written: written.len(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rw4_common::{Blob, BlobKind, DXT5, FileType, Texture};

    fn texture_file() -> Vec<u8> {
        let mut model = Model::new(FileType::Texture);
        let data = model.add_object(
            Blob::new(BlobKind::TextureData, vec![1; 16]),
            type_code::TEXTURE_DATA,
        );
        model.add_object(
            Texture {
                texture_type: DXT5,
                unk1: 0,
                width: 4,
                height: 4,
                mipmap_info: 0x108,
                data,
            },
            type_code::TEXTURE,
        );
        model.to_bytes().unwrap()
    }

    #[test]
    fn test_listing() {
        let model = Model::read(&texture_file()).unwrap();
        let lines = section_listing(&model);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("#0 0x"));
        assert!(lines[0].ends_with(": 0x10030 Buffer"));
        assert!(lines[1].ends_with(": 0x20003 Texture"));
    }

    #[test]
    fn test_written_file_verifies() {
        let verified = verify(&texture_file(), ReadOptions::default()).unwrap();
        assert_eq!(verified, Verification::Identical);
    }

    #[test]
    fn test_first_difference() {
        assert_eq!(first_difference(b"abcd", b"abcd"), None);
        assert_eq!(first_difference(b"abcd", b"abXd"), Some(2));
        assert_eq!(first_difference(b"abcd", b"abcdef"), Some(4));
        assert_eq!(first_difference(b"abc", b""), Some(0));
    }
}
