//! Study guide export to the local filesystem.

use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use coursewatch_markdown::{StudyGuideDoc, render_study_guide, study_guide_file_name};
use coursewatch_shared::{CourseWatchError, Result};

/// Render `doc` and write it into `dir`, replacing any earlier guide for the
/// same assessment. Returns the written path.
#[instrument(skip_all, fields(dir = %dir.display(), exam = %doc.assessment.name))]
pub fn export_study_guide(dir: &Path, doc: &StudyGuideDoc<'_>) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| CourseWatchError::io(dir, e))?;

    let filename = study_guide_file_name(&doc.assessment.name);
    let target = dir.join(&filename);
    let temp = dir.join(format!(".{filename}.tmp"));
    let content = render_study_guide(doc);

    std::fs::write(&temp, &content).map_err(|e| CourseWatchError::io(&temp, e))?;
    std::fs::rename(&temp, &target).map_err(|e| CourseWatchError::io(&target, e))?;

    debug!(file = %filename, size = content.len(), "wrote study guide");
    Ok(target)
}
