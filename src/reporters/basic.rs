//! Plain-text grade list

use std::fmt::Write;

use crate::error::GraderResult;
use crate::models::AssessmentResult;
use crate::plugins::{check_empty_args, Plugin, ReportContext, ReportRenderer};

pub struct BasicReport;

impl Plugin for BasicReport {
    fn name(&self) -> &str {
        "basic"
    }

    fn doc(&self) -> &str {
        "Generate a basic assessment report directly to the standard output."
    }
}

impl ReportRenderer for BasicReport {
    fn render(
        &self,
        _ctx: &ReportContext,
        result: &AssessmentResult,
        args: &[String],
    ) -> GraderResult<String> {
        check_empty_args(args)?;

        let mut out = String::new();
        for student in &result.students {
            let _ = writeln!(out, "- Student: {}", student.id);
            let _ = writeln!(out, "\tGrade: {}", student.grade());
        }
        Ok(out)
    }
}
