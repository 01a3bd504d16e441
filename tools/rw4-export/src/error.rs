//! Export-side failures and the short codes used in batch tallies

use rw4_shared::TransformError;

/// Unsupported shapes and malformed interchange documents
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("only exactly one mesh supported, found {0}")]
    MeshCount(usize),
    #[error("only models with a vertex array can be unpacked")]
    NoVertexArray,
    #[error("only exactly one texture supported in a texture file, found {0}")]
    TextureCount(usize),
    #[error("animation channel {0:#010x} names no joint of the skeleton")]
    UnknownJoint(u32),
    #[error("skeleton has {joints} joints but {matrices} bind matrices")]
    BindMatrixCount { joints: usize, matrices: usize },
    #[error("bind matrix {0} has nonzero cells in its bottom row")]
    ExtraMatrixCells(usize),
    #[error("joint {joint} has parent {parent}, outside the skeleton")]
    ParentOutOfRange { joint: usize, parent: usize },
    #[error("template has no {0} section")]
    TemplateMissing(&'static str),

    #[error("<{element}> is missing attribute '{attribute}'")]
    MissingAttribute { element: String, attribute: String },
    #[error("<{element}> attribute '{attribute}' has invalid value '{value}'")]
    InvalidAttribute {
        element: String,
        attribute: String,
        value: String,
    },
    #[error("missing <{0}> element")]
    MissingElement(String),
    #[error("missing vertex {what} data: {found} of {expected}")]
    MissingVertexData {
        what: &'static str,
        found: usize,
        expected: usize,
    },
    #[error("unsupported face type '{0}'")]
    UnsupportedOperation(String),
    #[error("vertex index {0} does not fit a 16-bit triangle")]
    IndexOverflow(u32),
}

impl ExportError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MeshCount(_) => "EX001",
            Self::NoVertexArray => "EX002",
            Self::TextureCount(_) => "EX003",
            Self::UnknownJoint(_) => "EX004",
            Self::BindMatrixCount { .. } => "EX005",
            Self::ExtraMatrixCells(_) => "EX006",
            Self::ParentOutOfRange { .. } => "EX007",
            Self::TemplateMissing(_) => "EX010",
            Self::MissingAttribute { .. } => "OX001",
            Self::InvalidAttribute { .. } => "OX002",
            Self::MissingElement(_) => "OX003",
            Self::MissingVertexData { .. } => "OX004",
            Self::UnsupportedOperation(_) => "OX005",
            Self::IndexOverflow(_) => "OX006",
        }
    }
}

/// Short code for any failure in the chain, falling back to the root message
pub fn error_code(err: &anyhow::Error) -> String {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<rw4_common::Error>() {
            return e.code().to_string();
        }
        if let Some(e) = cause.downcast_ref::<ExportError>() {
            return e.code().to_string();
        }
        if let Some(e) = cause.downcast_ref::<TransformError>() {
            return e.code().to_string();
        }
    }
    err.root_cause().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_code_through_context() {
        let err = Err::<(), _>(ExportError::NoVertexArray)
            .context("Failed to unpack model")
            .unwrap_err();
        assert_eq!(error_code(&err), "EX002");
    }

    #[test]
    fn test_codec_and_transform_codes() {
        let format = rw4_common::FormatError::new("H000", 0);
        let err = anyhow::Error::from(rw4_common::Error::from(format));
        assert_eq!(error_code(&err), "H000");

        let err = anyhow::Error::from(TransformError::Scaled {
            column: 0,
            length_sq: 4.0,
        });
        assert_eq!(error_code(&err), "XF002");
    }

    #[test]
    fn test_unknown_error_uses_message() {
        let err = anyhow::anyhow!("something else");
        assert_eq!(error_code(&err), "something else");
    }
}
