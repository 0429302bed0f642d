use thiserror::Error;

#[derive(Error, Debug)]
pub enum HiveSpecError {
    #[error("error reading spec: `{0}`")]
    IOError(#[from] std::io::Error),

    #[error("error parsing spec: `{0}`")]
    SerdeYamlError(#[from] serde_yaml::Error),

    #[error("process `{0}` declares an empty cmd")]
    EmptyCmd(String),
}
