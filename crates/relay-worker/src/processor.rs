//! Job processor trait - the seam to the image-processing collaborator.
//!
//! Implementations connect to the actual processing routine (detection,
//! annotation, transcoding); the worker runtime treats them as an opaque
//! `bytes -> bytes` function that may fail.

use relay_types::ProcessingError;

/// Synchronous transformation from raw input bytes to raw output bytes.
///
/// Invoked at most once per delivered message, on a blocking thread, with
/// at most one invocation in flight per worker process. Implementations
/// may use additional threads internally; that is outside this layer's
/// concern.
pub trait JobProcessor: Send + Sync + 'static {
    /// Process one job input.
    ///
    /// # Errors
    ///
    /// [`ProcessingError`] when the input cannot be processed; the worker
    /// converts it into a failure response for the caller.
    fn process(&self, input: &[u8]) -> Result<Vec<u8>, ProcessingError>;
}

/// Closures are processors, which keeps tests and small deployments free
/// of wrapper types.
impl<F> JobProcessor for F
where
    F: Fn(&[u8]) -> Result<Vec<u8>, ProcessingError> + Send + Sync + 'static,
{
    fn process(&self, input: &[u8]) -> Result<Vec<u8>, ProcessingError> {
        self(input)
    }
}
