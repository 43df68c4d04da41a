//! JSON config source backed by [`FileSource`].

use std::path::PathBuf;

use super::file_source::FileSource;

#[must_use]
pub fn new(path: PathBuf) -> FileSource {
    FileSource::new(path, "json", |content| {
        serde_json::from_str(content).map_err(Into::into)
    })
}
