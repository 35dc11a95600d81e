// src/web/views.rs
//! Server-rendered dashboard page

use v_htmlescape::escape;

use crate::metrics::{IdleJob, SnapshotSummary, Totals};
use crate::types::{IngestRun, JobRecord};

const NO_HISTORY: &str = r#"<p class="muted">No ingest history yet.</p>"#;

/// Whole dollars with thousands separators
pub fn money(value: f64) -> String {
    let rounded = value.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0 {
        format!("-${}", grouped)
    } else {
        format!("${}", grouped)
    }
}

pub fn pct(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.1}%", v * 100.0),
        None => "&ndash;".to_string(),
    }
}

fn hours(value: f64) -> String {
    format!("{:.1}", value)
}

pub fn render_index_page(latest: Option<&SnapshotSummary>, runs: Option<&[IngestRun]>) -> String {
    let summary_html = match latest {
        Some(latest) => render_summary(latest),
        None => String::new(),
    };
    let runs_html = match runs {
        Some(runs) if !runs.is_empty() => render_runs(runs),
        _ => NO_HISTORY.to_string(),
    };

    format!(
        r##"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>RHome EOD Dashboard</title>
  <link rel="stylesheet" href="/static/styles.css">
  <style>
    body {{ font-family: system-ui, -apple-system, 'Segoe UI', Roboto, Arial, sans-serif; padding: 2rem; }}
    .bar {{ display: flex; gap: 1rem; margin-bottom: 1.25rem; }}
    form button {{ padding: .6rem 1rem; font-weight: 600; cursor: pointer; }}
    .cards {{ display: grid; grid-template-columns: repeat(auto-fit, minmax(160px, 1fr)); gap: .75rem; max-width: 1000px; }}
    .card {{ border: 1px solid #ddd; border-radius: 8px; padding: .6rem .8rem; }}
    .card span {{ display: block; color: #777; font-size: .85rem; }}
    table {{ border-collapse: collapse; margin-top: 1rem; width: 100%; max-width: 1000px; }}
    th, td {{ border: 1px solid #ddd; padding: .4rem .6rem; text-align: left; }}
    td.num {{ text-align: right; }}
    .muted {{ color: #777; }}
  </style>
</head>
<body>
  <h1>RHome EOD Dashboard</h1>
  <div class="bar">
    <form method="post" action="/ingest/live">
      <button type="submit">Run Live Ingest</button>
    </form>
    <form method="post" action="/ingest/demo">
      <button type="submit">Load Demo Data</button>
    </form>
  </div>
  {summary_html}
  {runs_html}
</body>
</html>"##
    )
}

fn render_summary(latest: &SnapshotSummary) -> String {
    let summary = &latest.summary;
    let mut html = format!(
        r#"<h2>Snapshot #{id} <span class="muted">{as_of}</span></h2>"#,
        id = latest.snapshot.id,
        as_of = latest.snapshot.as_of.format("%Y-%m-%d %H:%M UTC"),
    );
    html.push_str(&render_totals(&summary.totals));

    html.push_str("<h2>Top cost today</h2>");
    html.push_str(&job_table(&summary.top_cost_today, "No cost recorded today."));

    html.push_str("<h2>At risk</h2>");
    html.push_str(&job_table(&summary.at_risk, "Nothing at risk."));

    html.push_str("<h2>Idle 3+ days</h2>");
    html.push_str(&render_exceptions(&summary.exceptions));

    html.push_str("<h2>All active jobs</h2>");
    html.push_str(&job_table(&summary.jobs, "No active jobs in this snapshot."));
    html
}

fn render_totals(totals: &Totals) -> String {
    let cards = [
        ("Active jobs", totals.job_count.to_string()),
        ("Hours today", hours(totals.hours_today)),
        ("Cost today", money(totals.cost_today)),
        ("Cost to date", money(totals.actual_cost_to_date)),
        ("Estimated cost", money(totals.estimated_cost)),
        ("Cost to complete", money(totals.cost_to_complete)),
        ("GM to date", pct(totals.gm_to_date_pct)),
        ("Burn", pct(totals.burn_pct)),
    ];

    let items: String = cards
        .iter()
        .map(|(label, value)| format!(r#"<div class="card"><span>{}</span>{}</div>"#, label, value))
        .collect();
    format!(r#"<div class="cards">{}</div>"#, items)
}

fn job_row(job: &JobRecord) -> String {
    format!(
        "<tr><td>{code}</td><td>{name}</td><td>{client}</td><td>{stage}</td>\
         <td class=\"num\">{hours_today}</td><td class=\"num\">{cost_today}</td>\
         <td class=\"num\">{cost}</td><td class=\"num\">{est}</td>\
         <td class=\"num\">{burn}</td><td class=\"num\">{gm}</td></tr>",
        code = escape(&job.job_code),
        name = escape(&job.job_name),
        client = escape(&job.client_name),
        stage = escape(&job.stage),
        hours_today = hours(job.hours_today),
        cost_today = money(job.cost_today),
        cost = money(job.actual_cost_to_date),
        est = money(job.estimated_cost),
        burn = pct(job.burn_pct),
        gm = pct(job.gm_actual_pct),
    )
}

fn job_table(jobs: &[JobRecord], empty: &str) -> String {
    if jobs.is_empty() {
        return format!(r#"<p class="muted">{}</p>"#, empty);
    }

    let rows: String = jobs.iter().map(job_row).collect();
    format!(
        "<table><thead><tr><th>Job</th><th>Name</th><th>Client</th><th>Stage</th>\
         <th>Hours today</th><th>Cost today</th><th>Cost to date</th><th>Est. cost</th>\
         <th>Burn</th><th>GM</th></tr></thead><tbody>{}</tbody></table>",
        rows
    )
}

fn render_exceptions(idle: &[IdleJob]) -> String {
    if idle.is_empty() {
        return r#"<p class="muted">No idle jobs.</p>"#.to_string();
    }

    let rows: String = idle
        .iter()
        .map(|entry| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td class=\"num\">{}</td></tr>",
                escape(&entry.job.job_code),
                escape(&entry.job.job_name),
                escape(&entry.job.client_name),
                entry.idle_days
            )
        })
        .collect();
    format!(
        "<table><thead><tr><th>Job</th><th>Name</th><th>Client</th><th>Idle days</th></tr></thead>\
         <tbody>{}</tbody></table>",
        rows
    )
}

fn render_runs(runs: &[IngestRun]) -> String {
    let rows: String = runs
        .iter()
        .map(|run| {
            format!(
                "<tr><td>{id}</td><td>{mode}</td><td>{started}</td><td>{ended}</td><td>{ok}</td>\
                 <td class=\"num\">{tried}</td><td class=\"num\">{inserted}</td><td>{note}</td></tr>",
                id = run.id,
                mode = escape(&run.mode),
                started = run.started_at.format("%Y-%m-%d %H:%M:%S"),
                ended = run
                    .ended_at
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_default(),
                ok = if run.ok { "✅" } else { "❌" },
                tried = run.jobs_tried,
                inserted = run.jobs_inserted,
                note = escape(run.note.as_deref().unwrap_or("")),
            )
        })
        .collect();

    format!(
        "<h2>Recent ingest runs</h2>\
         <table class=\"runs\"><thead><tr><th>ID</th><th>Mode</th><th>Started</th><th>Ended</th>\
         <th>OK</th><th>Tried</th><th>Inserted</th><th>Note</th></tr></thead><tbody>{}</tbody></table>",
        rows
    )
}
