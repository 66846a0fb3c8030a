use super::RequestsLoggingLevel;

#[derive(Clone)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub port: u16,
    pub frontend_dir_path: Option<String>,
    /// Upload caps in bytes, enforced by content validation. The request
    /// body limit is derived from the audio cap plus multipart overhead.
    pub max_audio_bytes: u64,
    pub max_image_bytes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            port: 3001,
            frontend_dir_path: None,
            max_audio_bytes: 200 * 1024 * 1024,
            max_image_bytes: 10 * 1024 * 1024,
        }
    }
}
