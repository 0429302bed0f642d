mod error;
mod hive_spec;
pub mod loader;

pub use error::HiveSpecError;
pub use hive_spec::{
    EnvVar, EnvVarSource, HiveSpec, Metadata, ProcessSpec, RestartPolicy, SecretKeyRef, Spec,
};
pub use loader::{HiveSpecLoader, HiveSpecLoaderFile};
