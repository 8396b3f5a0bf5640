//! Terminal reports for cost estimates and workflow status.
//!
//! Costs arrive in nano-dollars and are shown either in dollars (three
//! decimals) or in nano-dollars (scientific notation).

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::Path;

use anyhow::Context;
use clap::ValueEnum;
use cromulent_cost::CostSummary;
use crossterm::style::Stylize;
use serde::{Deserialize, Serialize};

use crate::ops::TaskRow;

const COST_HEADERS: [&str; 7] = ["task", "# called", "cpu", "mem", "disk", "total", "avg. cost"];
const TASK_HEADERS: [&str; 3] = ["TASK_NAME", "SHARDS", "ATTEMPTS"];

/// Output format of `estimate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReportKind {
    /// Per-task table followed by a summary
    #[default]
    Standard,
    /// JSON that `--import-raw-cost-data` reads back
    Raw,
}

/// A saved estimate: `{"id": ..., "tasks": {task: {"total-cost", "items"}}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCostReport {
    pub id: String,
    pub tasks: CostSummary,
}

impl RawCostReport {
    pub fn new(id: impl Into<String>, tasks: CostSummary) -> Self {
        Self { id: id.into(), tasks }
    }

    /// Read a report previously written by [`raw_report`].
    pub fn import(path: &Path) -> anyhow::Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("reading cost data from {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("parsing cost data from {}", path.display()))
    }
}

fn display_cost(amount_nanos: f64, nanos: bool) -> String {
    if nanos {
        format!("{:>8.4e}", amount_nanos)
    } else {
        format!("{:>8.3}", amount_nanos * 1e-9)
    }
}

/// First column left-aligned, the rest right-aligned.
fn write_table<W: Write, const N: usize>(
    out: &mut W,
    headers: [&str; N],
    rows: &[[String; N]],
    indent: &str,
) -> io::Result<()> {
    let mut widths = headers.map(str::len);
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.trim().len());
        }
    }

    let cell = |i: usize, text: &str| {
        if i == 0 {
            format!("{:<w$}", text, w = widths[i])
        } else {
            format!("{:>w$}", text, w = widths[i])
        }
    };

    let header: Vec<String> = headers.iter().enumerate().map(|(i, h)| cell(i, h)).collect();
    writeln!(out, "{}{}", indent, header.join("  "))?;
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    writeln!(out, "{}{}", indent, rule.join("  "))?;
    for row in rows {
        let cells: Vec<String> = row.iter().enumerate().map(|(i, c)| cell(i, c.trim())).collect();
        writeln!(out, "{}{}", indent, cells.join("  "))?;
    }
    Ok(())
}

/// Per-task table sorted by task name, then the totals.
pub fn standard_report<W: Write>(out: &mut W, workflow_id: &str, summary: &CostSummary, nanos: bool) -> io::Result<()> {
    let mut tasks: Vec<_> = summary.tasks().iter().collect();
    tasks.sort_by(|a, b| a.name.cmp(&b.name));

    let rows: Vec<[String; 7]> = tasks
        .iter()
        .map(|task| {
            [
                task.name.clone(),
                task.call_count().to_string(),
                display_cost(task.cpu, nanos),
                display_cost(task.mem, nanos),
                display_cost(task.disk, nanos),
                display_cost(task.total_cost, nanos),
                display_cost(task.average_cost(), nanos),
            ]
        })
        .collect();

    writeln!(out, "=== Workflow: {} ===", workflow_id)?;
    writeln!(out)?;
    let unit = if nanos { "nano dollars (USD)" } else { "dollars (USD)" };
    writeln!(out, "    Prices in: '{}'", unit)?;
    writeln!(out)?;
    write_table(out, COST_HEADERS, &rows, "    ")?;
    writeln!(out)?;

    let totals = summary.resource_totals();
    let calls: usize = tasks.iter().map(|t| t.call_count()).sum();
    writeln!(out, "    = Summary ======================")?;
    writeln!(out, "    {}", format!("       cpu  : {}", display_cost(totals.cpu, nanos)).blue())?;
    writeln!(out, "    {}", format!("       mem  : {}", display_cost(totals.mem, nanos)).blue())?;
    writeln!(out, "    {}", format!("       disk : {}", display_cost(totals.disk, nanos)).blue())?;
    writeln!(
        out,
        "    {}",
        format!("Total Cost  : {}", display_cost(summary.total_cost(), nanos)).green()
    )?;
    writeln!(out, "    {}", format!("Total Calls : {}", calls).yellow())?;
    writeln!(out, "    ================================")?;
    Ok(())
}

/// Pretty JSON of `{"id", "tasks"}`.
pub fn raw_report<W: Write>(out: &mut W, workflow_id: &str, summary: &CostSummary) -> anyhow::Result<()> {
    let report = RawCostReport::new(workflow_id, summary.clone());
    serde_json::to_writer_pretty(&mut *out, &report)?;
    writeln!(out)?;
    Ok(())
}

pub fn ops_list<W: Write>(out: &mut W, job_ids: &[&str]) -> io::Result<()> {
    for job_id in job_ids {
        writeln!(out, "{}", job_id)?;
    }
    Ok(())
}

pub fn ops_tasks<W: Write>(out: &mut W, tasks: &[TaskRow]) -> io::Result<()> {
    let rows: Vec<[String; 3]> = tasks
        .iter()
        .map(|t| [t.name.clone(), t.shards.to_string(), t.attempts.to_string()])
        .collect();
    write_table(out, TASK_HEADERS, &rows, "")
}

pub fn workflow_status<W: Write>(out: &mut W, workflow_id: &str, status: &str) -> io::Result<()> {
    let styled = match status {
        "Failed" => status.red(),
        "Succeeded" => status.green(),
        _ => status.yellow(),
    };
    writeln!(out, "{} : {}", workflow_id, styled)
}

/// Done and Failed counts first, then every other status alphabetically.
pub fn execution_status<W: Write>(out: &mut W, workflow_id: &str, summary: &BTreeMap<String, usize>) -> io::Result<()> {
    let count = |status: &str| summary.get(status).copied().unwrap_or(0);
    writeln!(out, "{} :", workflow_id)?;
    writeln!(out, "    {} : {}", "Done".green(), count("Done"))?;
    writeln!(out, "    {} : {}", "Failed".red(), count("Failed"))?;
    for (status, n) in summary {
        if status != "Done" && status != "Failed" {
            writeln!(out, "    {} : {}", status.as_str().yellow(), n)?;
        }
    }
    Ok(())
}
