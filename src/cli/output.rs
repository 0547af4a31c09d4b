//! User-facing output for the CLI.
//!
//! Reports are written to any [`WriteColor`], so the same code renders to a
//! colored terminal, a plain pipe, or an in-memory buffer in tests.

use std::io::{self, Write};

use difference::{Changeset, Difference};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::assertion::{Failure, Tone, LABEL_WIDTH};
use crate::discovery::Suite;
use crate::model::Definition;
use crate::runner::{CaseStatus, SuiteSummary};

pub fn color_choice(use_colors: bool) -> ColorChoice {
    if use_colors {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    }
}

/// Prints the hierarchical report to stdout.
pub fn print_report(summary: &SuiteSummary, use_colors: bool) -> io::Result<()> {
    let mut stdout = StandardStream::stdout(color_choice(use_colors));
    write_report(&mut stdout, summary)
}

pub fn print_json(summary: &SuiteSummary) -> io::Result<()> {
    let json = serde_json::to_string_pretty(summary).map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    println!("{json}");
    Ok(())
}

pub fn print_listing<V>(suite: &Suite<V>, use_colors: bool) -> io::Result<()> {
    let mut stdout = StandardStream::stdout(color_choice(use_colors));
    write_listing(&mut stdout, suite)
}

// ============================================================================
// RENDERING
// ============================================================================

pub fn write_report<W: WriteColor>(out: &mut W, summary: &SuiteSummary) -> io::Result<()> {
    for (group, reports) in summary.groups() {
        paint(out, Some(Color::Cyan), true)?;
        writeln!(out, "{group}")?;
        out.reset()?;
        for report in reports {
            match &report.status {
                CaseStatus::Pass => {
                    status(out, "PASS", Color::Green)?;
                    writeln!(out, " {}", report.case)?;
                }
                CaseStatus::Skip { reason } => {
                    status(out, "SKIP", Color::Yellow)?;
                    writeln!(out, " {} ({reason})", report.case)?;
                }
                CaseStatus::Fail { failures } => {
                    status(out, "FAIL", Color::Red)?;
                    writeln!(out, " {}", report.case)?;
                    for failure in failures {
                        write_failure(out, failure)?;
                    }
                }
            }
        }
    }
    write_totals(out, summary)
}

fn write_totals<W: WriteColor>(out: &mut W, summary: &SuiteSummary) -> io::Result<()> {
    writeln!(out)?;
    write!(out, "test result: ")?;
    if summary.is_success() {
        paint(out, Some(Color::Green), true)?;
        write!(out, "ok")?;
    } else {
        paint(out, Some(Color::Red), true)?;
        write!(out, "FAILED")?;
    }
    out.reset()?;
    write!(
        out,
        ". {} passed; {} failed; {} skipped",
        summary.passed, summary.failed, summary.skipped
    )?;
    if summary.internal > 0 {
        write!(out, " ({} with internal errors)", summary.internal)?;
    }
    writeln!(out)
}

/// A failure indented under its case, one highlighted line per detail.
pub fn write_failure<W: WriteColor>(out: &mut W, failure: &Failure) -> io::Result<()> {
    const INDENT: &str = "    ";
    paint(out, Some(Color::Red), true)?;
    writeln!(out, "{INDENT}{}", failure.title())?;
    out.reset()?;

    let continuation = format!("\n{INDENT}{:width$}", "", width = LABEL_WIDTH);
    for line in failure.details() {
        paint(out, Some(Color::Cyan), false)?;
        write!(out, "{INDENT}{:<width$}", format!("{}:", line.label), width = LABEL_WIDTH)?;
        out.reset()?;
        out.set_color(&tone_spec(line.tone))?;
        write!(out, "{}", line.value.replace('\n', &continuation))?;
        out.reset()?;
        writeln!(out)?;
    }

    if let Failure::EqualMismatch {
        expected, actual, ..
    } = failure
    {
        writeln!(out, "{INDENT}diff:")?;
        let changeset = Changeset::new(expected, actual, "\n");
        write_diff(out, &changeset.diffs, INDENT)?;
    }
    Ok(())
}

/// Line diff from expected to actual: `-` expected only, `+` actual only.
fn write_diff<W: WriteColor>(out: &mut W, diffs: &[Difference], indent: &str) -> io::Result<()> {
    for diff in diffs {
        let (marker, color, text) = match diff {
            Difference::Same(text) => (' ', None, text),
            Difference::Rem(text) => ('-', Some(Color::Green), text),
            Difference::Add(text) => ('+', Some(Color::Red), text),
        };
        paint(out, color, false)?;
        for line in text.split('\n') {
            writeln!(out, "{indent}{marker}{line}")?;
        }
        out.reset()?;
    }
    Ok(())
}

pub fn write_listing<W: WriteColor, V>(out: &mut W, suite: &Suite<V>) -> io::Result<()> {
    for (group, cases) in suite.iter() {
        paint(out, Some(Color::Cyan), true)?;
        writeln!(out, "{group}")?;
        out.reset()?;
        for case in cases {
            match &case.definition {
                Definition::Path(path) => writeln!(out, "  {} ({path})", case.name)?,
                Definition::Value(_) => writeln!(out, "  {}", case.name)?,
            }
        }
    }
    writeln!(
        out,
        "\n{} tests across {} groups",
        suite.case_count(),
        suite.group_names().len()
    )
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

fn paint<W: WriteColor>(out: &mut W, color: Option<Color>, bold: bool) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(color).set_bold(bold))
}

fn tone_spec(tone: Tone) -> ColorSpec {
    let mut spec = ColorSpec::new();
    match tone {
        Tone::Definition => {
            spec.set_fg(Some(Color::Yellow));
        }
        Tone::Expected => {
            spec.set_fg(Some(Color::Green));
        }
        Tone::Actual => {
            spec.set_fg(Some(Color::Red));
        }
        Tone::Muted => {
            spec.set_dimmed(true);
        }
        Tone::Plain => {}
    }
    spec
}

fn status<W: WriteColor>(out: &mut W, label: &str, color: Color) -> io::Result<()> {
    write!(out, "  ")?;
    paint(out, Some(color), true)?;
    write!(out, "{label}")?;
    out.reset()
}
