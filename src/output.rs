//! Rendering of a [`WhoamiReport`] for the terminal.

use std::fmt::Write;

use crate::record::DirectoryRecord;
use crate::whoami::WhoamiReport;

const USER_HEADINGS: [&str; 3] = ["User Name", "SID", "Distinguished Name"];
const GROUP_HEADINGS: [&str; 3] = ["Group Name", "SID", "Distinguished Name"];

/// Text output: `domain\account` when nothing else was looked up, otherwise
/// a user table and/or a group table.
pub fn render_text(report: &WhoamiReport) -> String {
    if report.user.is_none() && report.groups.is_none() {
        return format!("{}\n", report.identity);
    }

    let mut out = String::new();
    if let Some(user) = &report.user {
        out.push_str(&render_table(
            "User information",
            USER_HEADINGS,
            std::iter::once(user),
        ));
    }
    if let Some(groups) = &report.groups {
        out.push_str(&render_table(
            "Group information",
            GROUP_HEADINGS,
            groups.groups.iter(),
        ));
    }
    out
}

/// The whole report as pretty-printed JSON.
pub fn render_json(report: &WhoamiReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

/// Title, dashed underline, padded headings, `=` rule, one row per record.
pub fn render_table<'a, I>(title: &str, headings: [&str; 3], records: I) -> String
where
    I: IntoIterator<Item = &'a DirectoryRecord>,
{
    let rows: Vec<[String; 3]> = records
        .into_iter()
        .map(|r| {
            [
                r.account_name.clone(),
                r.security_identifier.to_string(),
                r.distinguished_name.clone(),
            ]
        })
        .collect();

    let mut widths = headings.map(|h| h.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", title.to_uppercase());
    let _ = writeln!(out, "{}", "-".repeat(title.chars().count()));
    let _ = writeln!(out);
    push_row(&mut out, &headings, &widths);
    let rule = widths.map(|w| "=".repeat(w));
    push_row(&mut out, &rule, &widths);
    for row in &rows {
        push_row(&mut out, row, &widths);
    }
    let _ = writeln!(out);
    out
}

fn push_row<S: AsRef<str>>(out: &mut String, cells: &[S; 3], widths: &[usize; 3]) {
    let line = format!(
        "{:<w0$} {:<w1$} {:<w2$}",
        cells[0].as_ref(),
        cells[1].as_ref(),
        cells[2].as_ref(),
        w0 = widths[0],
        w1 = widths[1],
        w2 = widths[2],
    );
    out.push_str(line.trim_end());
    out.push('\n');
}
