use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
  #[error("Config: {0}")]
  Config(String),

  #[error("Validation: {0}")]
  Validation(String),

  #[error("IO: {0}")]
  Io(#[from] std::io::Error),

  #[error("TOML: {0}")]
  Toml(#[from] toml::de::Error),

  #[error("JSON: {0}")]
  Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
