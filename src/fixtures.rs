//! Sample files shipped with the crate.
use std::path::PathBuf;

use serde_json::Value;
use snafu::ResultExt;

use crate::error::{FixtureError, ParseFixtureSnafu, ReadFixtureSnafu};

/// Folder holding the sample files, relative to the crate root.
pub const FILE_FOLDER: &str = "tests/files";

/// Explicit VR little endian MR image with a 4x4 16-bit frame.
pub const TTFM: &str = "ttfm.dcm";

/// DICOM JSON rendering of the attributes of [`TTFM`].
pub const TTFM_REFERENCE: &str = "ttfm.json";

/// Absolute path of a sample file.
pub fn file_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join(FILE_FOLDER)
        .join(name)
}

/// Load a JSON sample file.
pub fn read_json(name: &str) -> Result<Value, FixtureError> {
    let path = file_path(name);
    let text = std::fs::read_to_string(&path).context(ReadFixtureSnafu { path: &path })?;
    serde_json::from_str(&text).context(ParseFixtureSnafu { path })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_are_present() {
        assert!(file_path(TTFM).is_file());
        let reference = read_json(TTFM_REFERENCE).unwrap();
        assert!(reference.get("00100010").is_some());
    }

    #[test]
    fn missing_sample_is_an_error() {
        assert!(matches!(
            read_json("nothing.json"),
            Err(FixtureError::ReadFixture { .. })
        ));
    }
}
