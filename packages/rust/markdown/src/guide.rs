//! Study guide document rendering.

use chrono::DateTime;
use chrono_tz::Tz;

use coursewatch_shared::{AssessmentMeta, ContentItem};

use crate::{html_to_markdown, normalize_generated};

/// One titled section of generated guide content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuideSection {
    pub heading: String,
    pub body: String,
}

/// Everything needed to render one study guide.
#[derive(Debug, Clone)]
pub struct StudyGuideDoc<'a> {
    pub assessment: &'a AssessmentMeta,
    /// Curated materials the guide was generated from, in curation order.
    pub materials: &'a [ContentItem],
    pub sections: Vec<GuideSection>,
    pub generated_at: DateTime<Tz>,
}

/// Render a study guide as a standalone Markdown document.
///
/// Layout: title, exam metadata, description, generated sections, then the
/// list of reviewed materials grouped by container.
pub fn render_study_guide(doc: &StudyGuideDoc<'_>) -> String {
    let exam = doc.assessment;
    let mut out = String::new();

    out.push_str("# Comprehensive Study Guide\n\n");
    out.push_str(&format!("## {}\n\n", exam.name));
    out.push_str(&format!("- **Course:** {}\n", exam.container_name));
    out.push_str(&format!(
        "- **Exam Date:** {}\n",
        exam.deadline.format("%B %d, %Y at %I:%M %p")
    ));
    out.push_str(&format!("- **Points:** {}\n", exam.points));
    out.push_str(&format!("- **Materials Covered:** {} items\n", doc.materials.len()));
    out.push_str(&format!(
        "- **Generated:** {}\n\n",
        doc.generated_at.format("%B %d, %Y at %I:%M %p")
    ));

    if !exam.description.trim().is_empty() {
        out.push_str("## Exam Description\n\n");
        let description = html_to_markdown(&exam.description, 3)
            .unwrap_or_else(|_| format!("{}\n", crate::clean_html(&exam.description)));
        out.push_str(&description);
        out.push('\n');
    }

    out.push_str("## Study Guide Content\n\n");
    for section in &doc.sections {
        if section.body.trim().is_empty() {
            continue;
        }
        out.push_str(&format!("### {}\n\n", section.heading));
        out.push_str(&normalize_generated(&section.body, 4));
        out.push('\n');
    }

    out.push_str("## Course Materials Reviewed\n\n");
    out.push_str(&format!(
        "This study guide was created from {} course materials:\n\n",
        doc.materials.len()
    ));

    let mut current_container: Option<&str> = None;
    for item in doc.materials {
        if current_container != Some(item.container_name.as_str()) {
            if current_container.is_some() {
                out.push('\n');
            }
            out.push_str(&format!("### {}\n\n", item.container_name));
            current_container = Some(item.container_name.as_str());
        }
        out.push_str(&format!("- **{}:** {}\n", item.kind, item.title));
    }

    let trimmed = out.trim_end_matches('\n');
    format!("{trimmed}\n")
}
