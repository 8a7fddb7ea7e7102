//! Long-form Markdown report
//!
//! Without arguments the whole report is returned as one document. With
//! `-f` each user's report is written to `reports_md/<id>.md` in the
//! assessment folder and the return value lists the files written.

use chrono::Local;
use std::fmt::Write;
use std::fs;
use tracing::debug;

use crate::error::{GraderError, GraderResult};
use crate::models::{AssessedRepo, AssessedStudent, Assessment, AssessmentResult};
use crate::paths;
use crate::plugins::{Plugin, ReportContext, ReportRenderer};

const EMPTY_REPO_NOTE: &str = "Repository not available and/or no assessments performed.";

pub struct MarkdownReport;

impl Plugin for MarkdownReport {
    fn name(&self) -> &str {
        "markdown"
    }

    fn doc(&self) -> &str {
        "Generate a Markdown assessment report.\n\
         Arguments: `-f` saves one report per student in the assessment folder."
    }
}

impl ReportRenderer for MarkdownReport {
    fn render(
        &self,
        ctx: &ReportContext,
        result: &AssessmentResult,
        args: &[String],
    ) -> GraderResult<String> {
        let to_files = match args {
            [] => false,
            [flag] if flag == "-f" => true,
            _ => return Err(GraderError::CliArgs(args.join(", "))),
        };

        let date = Local::now().format("%a %b %e %H:%M:%S %Y").to_string();

        if !to_files {
            let mut md = render_header(&date);
            for student in &result.students {
                md.push_str(&render_student(student));
            }
            return Ok(md);
        }

        let reports_dir = paths::reports_md_dir(&ctx.assess_folder);
        fs::create_dir_all(&reports_dir)?;
        let mut out = format!("- Markdown reports saved to {}.\n", reports_dir.display());
        for student in &result.students {
            let path = paths::student_report_file(&ctx.assess_folder, &student.id);
            fs::write(&path, render_header(&date) + &render_student(student))?;
            debug!("Wrote {:?}", path);
            let _ = writeln!(
                out,
                "- Assessment report for student {} saved at {}.",
                student.id,
                path.display()
            );
        }
        Ok(out)
    }
}

fn render_header(date: &str) -> String {
    format!("# Assessment report\n\n{}\n\n", date)
}

fn render_student(student: &AssessedStudent) -> String {
    let mut md = String::new();
    let _ = writeln!(md, "## Student {}\n", student.id);
    let _ = writeln!(md, "- Grade: {:.3}\n", student.grade());
    md.push_str("### Repositories\n\n");

    for repo in &student.assessed_repos {
        md.push_str(&render_repo(repo));
    }
    md
}

fn render_repo(repo: &AssessedRepo) -> String {
    let mut md = String::new();
    let _ = writeln!(md, "#### {}\n", repo.name);
    let _ = writeln!(md, "- Weight in grade: {}", repo.weight);
    let _ = writeln!(md, "- Grade (unweighted): {}", repo.grade_raw());
    let _ = writeln!(md, "- Final grade: {:.3}\n", repo.grade_final());
    md.push_str("##### Assessments\n\n");

    if repo.is_empty() {
        let _ = writeln!(md, "{}", EMPTY_REPO_NOTE);
    }
    for assessment in repo.all_assessments() {
        md.push_str(&render_assessment(assessment));
    }
    md.push('\n');
    md
}

fn render_assessment(assessment: &Assessment) -> String {
    let params = serde_json::to_string(&assessment.parameters).unwrap_or_default();
    let mut md = String::new();
    let _ = writeln!(md, "- `{}`", assessment.name);
    let _ = writeln!(md, "  - Description: {}", assessment.description);
    let _ = writeln!(md, "  - Parameters: `{}`", params);
    let _ = writeln!(md, "  - Weight in grade: {}", assessment.weight);
    let _ = writeln!(md, "  - Grade (unweighted): {}", assessment.grade_raw);
    let _ = writeln!(md, "  - Final grade: {:.3}", assessment.grade_final());
    md
}
