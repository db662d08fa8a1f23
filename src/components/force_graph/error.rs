#[derive(Debug, thiserror::Error)]
pub enum SyncError {
	#[error("no browser window available")]
	NoWindow,
	#[error("request failed: {0}")]
	Network(String),
	#[error("server responded with status {0}")]
	Status(u16),
	#[error("failed to decode graph document: {0}")]
	Decode(#[source] serde_json::Error),
	#[error("failed to encode graph document: {0}")]
	Encode(#[source] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;
