// Output sinks for manifests and diff reports

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use tracing::debug;

/// Creates writable outputs on demand.
///
/// `role` is the output's purpose: `<hashtag>.csv` for a calculation
/// manifest, `diffs` for a verification report. The factory returns the sink
/// together with the name under which it is visible to the user.
pub trait SinkFactory {
    type Sink: Write;

    fn create(&mut self, role: &str) -> io::Result<(Self::Sink, String)>;
}

impl<T: SinkFactory + ?Sized> SinkFactory for &mut T {
    type Sink = T::Sink;

    fn create(&mut self, role: &str) -> io::Result<(Self::Sink, String)> {
        (**self).create(role)
    }
}

/// File-backed sinks
#[derive(Debug, Clone)]
pub enum FileSinks {
    /// `<prefix>-<role>`, one file per role
    Prefixed(String),
    /// Always the same path, whatever the role
    Fixed(PathBuf),
}

impl FileSinks {
    pub fn path_for(&self, role: &str) -> PathBuf {
        match self {
            FileSinks::Prefixed(prefix) => PathBuf::from(format!("{prefix}-{role}")),
            FileSinks::Fixed(path) => path.clone(),
        }
    }
}

impl SinkFactory for FileSinks {
    type Sink = BufWriter<File>;

    fn create(&mut self, role: &str) -> io::Result<(Self::Sink, String)> {
        let path = self.path_for(role);
        debug!(?path, role, "Creating output file");
        let file = File::create(&path)?;
        Ok((BufWriter::new(file), path.to_string_lossy().to_string()))
    }
}
