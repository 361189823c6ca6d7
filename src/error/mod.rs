#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid configuration: {0} should be {1}")]
    InvalidConfig(String, String),

    #[error("Mismatched batch size: {0} should be {1}, but got {2}")]
    MismatchedBatchSize(&'static str, usize, usize),

    #[error("Mismatched feature dimension: {0} should be {1}, but got {2}")]
    MismatchedDimension(&'static str, usize, usize),

    #[error("Mismatched shape: {0} should be {1:?}, but got {2:?}")]
    MismatchedShape(&'static str, Vec<usize>, Vec<usize>),

    #[error("Missing fusion strategy: a back image needs convolution or cross-attention fusion")]
    MissingFusion,

    #[error("Unsupported encoder type: {0:?} should be one of {1:?}")]
    UnsupportedEncoder(String, Vec<&'static str>),
}

impl Error {
    /// Fail unless the batch size of `name` is `expected`.
    #[inline]
    pub fn ensure_batch_size(
        name: &'static str,
        expected: usize,
        actual: usize,
    ) -> Result<(), Self> {
        if expected != actual {
            return Err(Self::MismatchedBatchSize(name, expected, actual));
        }
        Ok(())
    }

    /// Fail unless the feature dimension of `name` is `expected`.
    #[inline]
    pub fn ensure_dimension(
        name: &'static str,
        expected: usize,
        actual: usize,
    ) -> Result<(), Self> {
        if expected != actual {
            return Err(Self::MismatchedDimension(name, expected, actual));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn ensure_batch_size() {
        use super::*;

        assert!(Error::ensure_batch_size("source_camera", 4, 4).is_ok());

        let error = Error::ensure_batch_size("source_camera", 4, 3).unwrap_err();
        assert!(matches!(error, Error::MismatchedBatchSize("source_camera", 4, 3)));
        assert_eq!(
            error.to_string(),
            "Mismatched batch size: source_camera should be 4, but got 3"
        );
    }

    #[test]
    fn ensure_dimension() {
        use super::*;

        assert!(Error::ensure_dimension("image_feats", 768, 768).is_ok());
        assert!(matches!(
            Error::ensure_dimension("image_feats", 768, 384),
            Err(Error::MismatchedDimension("image_feats", 768, 384))
        ));
    }
}
