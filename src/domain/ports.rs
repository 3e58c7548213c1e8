use crate::utils::error::Result;

/// Whole-file storage used at the edges of a session: inputs are read before
/// any enrollment logic runs and exports are written after it finishes.
pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

