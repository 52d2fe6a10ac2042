use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShmError {
    #[error("unable to get shared memory segment {key:#x}: {source}")]
    Get { key: i32, source: std::io::Error },
    #[error("unable to attach shared memory segment {id}: {source}")]
    Attach { id: i32, source: std::io::Error },
    #[error("NTP unit {0} is out of range")]
    InvalidUnit(i32),
}
