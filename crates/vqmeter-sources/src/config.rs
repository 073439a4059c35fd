use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use vqmeter_types::{Source, SourceError, SourceResult};

use crate::backends::synthetic::SyntheticSource;
use crate::backends::y4m::Y4mSource;

const BACKEND_ENV: &str = "VQMETER_BACKEND";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Y4m,
    Synthetic,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Y4m => "y4m",
            Backend::Synthetic => "synthetic",
        }
    }
}

impl FromStr for Backend {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "y4m" => Ok(Backend::Y4m),
            "synthetic" => Ok(Backend::Synthetic),
            other => Err(SourceError::configuration(format!(
                "unknown backend '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How to open one comparison side.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub input: PathBuf,
    /// Explicit backend; when unset the backend is inferred from the input's
    /// extension, after consulting `VQMETER_BACKEND`.
    pub backend: Option<Backend>,
}

impl Configuration {
    pub fn for_input(input: PathBuf) -> Self {
        Self {
            input,
            backend: None,
        }
    }

    pub fn from_env(input: PathBuf) -> SourceResult<Self> {
        let backend = match env::var(BACKEND_ENV) {
            Ok(value) => Some(Backend::from_str(&value)?),
            Err(_) => None,
        };
        Ok(Self { input, backend })
    }

    fn resolved_backend(&self) -> SourceResult<Backend> {
        if let Some(backend) = self.backend {
            return Ok(backend);
        }
        match self.input.extension().and_then(|ext| ext.to_str()) {
            Some("y4m") => Ok(Backend::Y4m),
            _ => Err(SourceError::configuration(format!(
                "cannot infer a backend for '{}'; pass one explicitly",
                self.input.display()
            ))),
        }
    }

    pub fn create_source(&self) -> SourceResult<Box<dyn Source>> {
        match self.resolved_backend()? {
            Backend::Y4m => Ok(Box::new(Y4mSource::open(&self.input)?)),
            Backend::Synthetic => Ok(Box::new(SyntheticSource::default_clip())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_round_trips_through_names() {
        for backend in [Backend::Y4m, Backend::Synthetic] {
            assert_eq!(Backend::from_str(backend.as_str()).unwrap(), backend);
        }
        assert!(Backend::from_str("gstreamer").is_err());
    }

    #[test]
    fn backend_is_inferred_from_extension() {
        let config = Configuration::for_input(PathBuf::from("clip.y4m"));
        assert_eq!(config.resolved_backend().unwrap(), Backend::Y4m);

        let config = Configuration::for_input(PathBuf::from("clip.mkv"));
        assert!(config.resolved_backend().is_err());
    }

    #[test]
    fn explicit_backend_wins_over_extension() {
        let config = Configuration {
            input: PathBuf::from("whatever.bin"),
            backend: Some(Backend::Synthetic),
        };
        assert_eq!(config.resolved_backend().unwrap(), Backend::Synthetic);
    }
}
