//! Output layout for exported predictions.
//!
//! Scans live under `<dataset>/sequences/<seq>/velodyne/<frame>.bin`. The
//! matching prediction goes to `<output>/sequences/<seq>/predictions/<frame>.label`.

use std::path::{Component, Path, PathBuf};

use crate::error::{PolarIoError, Result};
use crate::labels::write_labels;

const SEQUENCES_DIR: &str = "sequences";
const SCAN_DIR: &str = "velodyne";
const PREDICTION_DIR: &str = "predictions";
const LABEL_EXTENSION: &str = "label";

/// Map a scan path to the path of its prediction file under `output_root`.
///
/// Everything after the last `sequences` component is kept, a `velodyne`
/// component becomes `predictions` and the extension becomes `label`.
pub fn prediction_path(output_root: &Path, scan_path: &Path) -> Result<PathBuf> {
    let components: Vec<Component<'_>> = scan_path.components().collect();
    let start = components
        .iter()
        .rposition(|c| c.as_os_str() == SEQUENCES_DIR)
        .ok_or_else(|| invalid(scan_path, "no 'sequences' component"))?;

    let rest = &components[start + 1..];
    if rest.is_empty() {
        return Err(invalid(scan_path, "nothing after 'sequences'"));
    }

    let mut out = output_root.join(SEQUENCES_DIR);
    for component in rest {
        if component.as_os_str() == SCAN_DIR {
            out.push(PREDICTION_DIR);
        } else {
            out.push(component.as_os_str());
        }
    }
    out.set_extension(LABEL_EXTENSION);
    Ok(out)
}

/// Write the codes of one scan to its prediction path and return that path.
pub fn save_prediction(output_root: &Path, scan_path: &Path, codes: &[u32]) -> Result<PathBuf> {
    let path = prediction_path(output_root, scan_path)?;
    write_labels(&path, codes)?;
    Ok(path)
}

fn invalid(path: &Path, reason: &'static str) -> PolarIoError {
    PolarIoError::InvalidPath {
        path: path.to_string_lossy().into_owned(),
        reason,
    }
}
