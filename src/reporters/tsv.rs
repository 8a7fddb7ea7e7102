//! Tab-separated grade table

use std::fmt::Write;

use crate::error::GraderResult;
use crate::models::AssessmentResult;
use crate::plugins::{check_empty_args, Plugin, ReportContext, ReportRenderer};

pub struct TsvReport;

impl Plugin for TsvReport {
    fn name(&self) -> &str {
        "tsv"
    }

    fn doc(&self) -> &str {
        "Generate a TSV table with one grade per student."
    }
}

impl ReportRenderer for TsvReport {
    fn render(
        &self,
        _ctx: &ReportContext,
        result: &AssessmentResult,
        args: &[String],
    ) -> GraderResult<String> {
        check_empty_args(args)?;

        let mut out = String::from("student_id\tgrade\n");
        for student in &result.students {
            let _ = writeln!(out, "{}\t{}", student.id, student.grade());
        }
        Ok(out)
    }
}
