/// Error types for wire codec operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The destination buffer is smaller than the encoding requires.
    #[error("buffer too small: need {need} bytes, have {have}")]
    BufferTooSmall {
        /// Bytes the encoding requires.
        need: usize,
        /// Bytes the caller provided.
        have: usize,
    },

    /// The input ended before a complete value could be read.
    #[error("unexpected end of input")]
    UnexpectedEof,
}
