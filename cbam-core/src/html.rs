//! HTML report generation
//!
//! Generates a self-contained HTML report with embedded CSS. Charts are drawn with
//! plain HTML and inline styles, so the report works offline and needs no scripts.

use crate::pipeline::PipelineOutput;
use crate::report::RiskReport;
use crate::risk::{RISK_CATEGORY_COLUMN, UNKNOWN_CATEGORY};
use crate::scoring::{CorrelationMatrix, RiskDriver, AVG_RANK_COLUMN, RANK_COLUMN};
use crate::table::Table;

/// Render a full pipeline run as an HTML report
pub fn render_html(output: &PipelineOutput) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>CBAM Exposure Risk - {index}</title>
    <style>{css}</style>
</head>
<body>
    <div class="container">
        {header}
        {summary}
        {ranking}
        {comparison}
        {drivers}
        {correlation}
        {footer}
    </div>
</body>
</html>"#,
        index = html_escape(&output.index_column),
        css = inline_css(),
        header = render_header(&output.index_column, output.scenarios.len()),
        summary = render_summary(&output.report),
        ranking = render_ranking_chart(
            &output.ranked,
            &output.index_column,
            &output.country_column
        ),
        comparison = render_comparison_table(&output.comparison, &output.country_column),
        drivers = render_drivers(&output.drivers),
        correlation = render_heatmap(&output.correlation),
        footer = render_footer(),
    )
}

fn inline_css() -> &'static str {
    r#"
* {
    box-sizing: border-box;
    margin: 0;
    padding: 0;
}

body {
    font-family: system-ui, -apple-system, 'Segoe UI', sans-serif;
    line-height: 1.6;
    color: #111827;
    background: #ffffff;
}

.container {
    max-width: 1200px;
    margin: 0 auto;
    padding: 2rem;
}

header {
    margin-bottom: 2rem;
    padding-bottom: 1rem;
    border-bottom: 2px solid #e5e7eb;
}

header h1 {
    font-size: 2rem;
    font-weight: 700;
}

header .meta {
    color: #6b7280;
    font-size: 0.875rem;
}

.summary {
    display: grid;
    grid-template-columns: repeat(auto-fit, minmax(180px, 1fr));
    gap: 1rem;
    margin-bottom: 2rem;
}

.summary-card {
    background: #f9fafb;
    padding: 1rem;
    border-radius: 0.5rem;
    border-left: 4px solid #4682b4;
}

.summary-card h3 {
    font-size: 0.875rem;
    font-weight: 600;
    color: #6b7280;
}

.summary-card .value {
    font-size: 1.5rem;
    font-weight: 700;
}

.section {
    margin-bottom: 2rem;
}

.section h2 {
    font-size: 1.5rem;
    font-weight: 700;
    margin-bottom: 1rem;
}

.bar-row {
    display: grid;
    grid-template-columns: 3rem 14rem 1fr 5rem;
    gap: 0.5rem;
    align-items: center;
    font-size: 0.875rem;
}

.bar-track {
    background: #f3f4f6;
    height: 1rem;
    border-radius: 0.25rem;
}

.bar {
    height: 100%;
    border-radius: 0.25rem;
    background: #4682b4;
}

.bar.top-1 { background: #8b0000; }
.bar.top-2 { background: #ff4500; }
.bar.top-3 { background: #ffa500; }

table {
    border-collapse: collapse;
    font-size: 0.875rem;
}

th, td {
    padding: 0.25rem 0.75rem;
    border-bottom: 1px solid #e5e7eb;
    text-align: right;
}

th:first-child, td:first-child {
    text-align: left;
}

.heatmap td {
    text-align: center;
    min-width: 4.5rem;
}

.category-High { color: #b91c1c; font-weight: 600; }
.category-Medium { color: #d97706; }
.category-Low { color: #15803d; }
.category-Unknown { color: #9ca3af; }

.drivers {
    display: grid;
    grid-template-columns: repeat(auto-fit, minmax(260px, 1fr));
    gap: 1rem;
}

footer {
    color: #9ca3af;
    font-size: 0.75rem;
    border-top: 1px solid #e5e7eb;
    padding-top: 1rem;
}
"#
}

fn render_header(index: &str, scenarios: usize) -> String {
    format!(
        r#"<header>
    <h1>CBAM Comprehensive Risk Index</h1>
    <div class="meta">
        <span>Index: <strong>{index}</strong></span> •
        <span>Scenarios: {scenarios}</span>
    </div>
</header>"#,
        index = html_escape(index),
        scenarios = scenarios,
    )
}

fn render_summary(report: &RiskReport) -> String {
    let cards: String = [
        ("Countries", report.total_countries.to_string()),
        ("Scored", report.summary_stats.count.to_string()),
        ("Mean Risk", fmt_value(report.mean_risk)),
        ("Median Risk", fmt_value(report.median_risk)),
        ("Max Risk", fmt_value(report.summary_stats.max)),
    ]
    .iter()
    .map(|(title, value)| {
        format!(
            r#"
    <div class="summary-card">
        <h3>{}</h3>
        <div class="value">{}</div>
    </div>"#,
            title, value
        )
    })
    .collect();
    format!(r#"<div class="summary">{}
</div>"#, cards)
}

/// Horizontal bar per country in rank order; the top three bars are highlighted
fn render_ranking_chart(ranked: &Table, index_col: &str, country_col: &str) -> String {
    let Some(values) = ranked.numbers(index_col) else {
        return String::new();
    };
    let countries = ranked.column(country_col);
    let ranks = ranked.numbers(RANK_COLUMN);
    let categories = ranked.texts(RISK_CATEGORY_COLUMN);
    let max = values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(0.0_f64, f64::max);

    let mut rows = String::new();
    for (row, &value) in values.iter().enumerate() {
        let width = if value.is_nan() || max <= 0.0 {
            0.0
        } else {
            value / max * 100.0
        };
        let highlight = if row < 3 {
            format!(" top-{}", row + 1)
        } else {
            String::new()
        };
        let country = countries
            .as_ref()
            .map(|c| c.display_at(row))
            .unwrap_or_default();
        let category = categories
            .as_ref()
            .and_then(|c| c[row].as_deref())
            .unwrap_or(UNKNOWN_CATEGORY);
        rows.push_str(&format!(
            r#"
    <div class="bar-row">
        <span>{rank}</span>
        <span class="category-{category}">{country}</span>
        <div class="bar-track"><div class="bar{highlight}" style="width: {width:.1}%"></div></div>
        <span>{value}</span>
    </div>"#,
            rank = ranks.as_ref().map(|r| fmt_rank(r[row])).unwrap_or_default(),
            category = html_escape(category),
            country = html_escape(&country),
            highlight = highlight,
            width = width,
            value = fmt_value(value),
        ));
    }

    format!(
        r#"<section class="section" id="ranking">
    <h2>Country Ranking</h2>{rows}
</section>"#,
        rows = rows,
    )
}

/// Per-scenario ranks and their average
fn render_comparison_table(comparison: &Table, country_col: &str) -> String {
    if comparison.is_empty() {
        return String::new();
    }
    let header: String = comparison
        .column_names()
        .iter()
        .map(|name| format!("<th>{}</th>", html_escape(name)))
        .collect();

    let columns = comparison.columns();
    let mut body = String::new();
    for row in 0..comparison.n_rows() {
        body.push_str("\n        <tr>");
        for (name, column) in &columns {
            let cell = match column.as_numbers() {
                Some(values) if name == AVG_RANK_COLUMN => fmt_value(values[row]),
                Some(values) => fmt_rank(values[row]),
                None => html_escape(&column.display_at(row)),
            };
            if name == country_col {
                body.push_str(&format!("<td><strong>{}</strong></td>", cell));
            } else {
                body.push_str(&format!("<td>{}</td>", cell));
            }
        }
        body.push_str("</tr>");
    }

    format!(
        r#"<section class="section" id="scenarios">
    <h2>Scenario Comparison</h2>
    <table>
        <thead><tr>{header}</tr></thead>
        <tbody>{body}
        </tbody>
    </table>
</section>"#,
        header = header,
        body = body,
    )
}

fn render_drivers(drivers: &[(String, Vec<RiskDriver>)]) -> String {
    if drivers.is_empty() {
        return String::new();
    }
    let mut cards = String::new();
    for (country, components) in drivers {
        let rows: String = components
            .iter()
            .map(|d| {
                format!(
                    "<tr><td>{}</td><td>{}</td></tr>",
                    html_escape(&d.component),
                    fmt_value(d.value)
                )
            })
            .collect();
        cards.push_str(&format!(
            r#"
    <div>
        <h3>{country}</h3>
        <table><tbody>{rows}</tbody></table>
    </div>"#,
            country = html_escape(country),
            rows = rows,
        ));
    }
    format!(
        r#"<section class="section" id="drivers">
    <h2>Risk Drivers</h2>
    <div class="drivers">{cards}
    </div>
</section>"#,
        cards = cards,
    )
}

fn render_heatmap(matrix: &CorrelationMatrix) -> String {
    if matrix.columns.is_empty() {
        return String::new();
    }
    let header: String = matrix
        .columns
        .iter()
        .map(|c| format!("<th>{}</th>", html_escape(c)))
        .collect();

    let mut body = String::new();
    for (name, row) in matrix.columns.iter().zip(&matrix.values) {
        body.push_str(&format!("\n        <tr><th>{}</th>", html_escape(name)));
        for &r in row {
            body.push_str(&format!(
                r#"<td style="background: {}">{}</td>"#,
                heat_color(r),
                if r.is_nan() {
                    "-".to_string()
                } else {
                    format!("{:.2}", r)
                }
            ));
        }
        body.push_str("</tr>");
    }

    format!(
        r#"<section class="section" id="correlation">
    <h2>Component Correlation</h2>
    <table class="heatmap">
        <thead><tr><th></th>{header}</tr></thead>
        <tbody>{body}
        </tbody>
    </table>
</section>"#,
        header = header,
        body = body,
    )
}

/// Diverging blue (-1) / white (0) / red (+1) scale
fn heat_color(r: f64) -> String {
    if r.is_nan() {
        return "#e5e7eb".to_string();
    }
    let r = r.clamp(-1.0, 1.0);
    let fade = (255.0 * (1.0 - r.abs())).round() as u8;
    if r >= 0.0 {
        format!("rgb(255, {}, {})", fade, fade)
    } else {
        format!("rgb({}, {}, 255)", fade, fade)
    }
}

fn render_footer() -> String {
    r#"<footer>
    <p>Generated by cbam</p>
</footer>"#
        .to_string()
}

fn fmt_value(value: f64) -> String {
    if value.is_nan() {
        "-".to_string()
    } else {
        format!("{:.3}", value)
    }
}

fn fmt_rank(rank: f64) -> String {
    if rank.is_nan() {
        "-".to_string()
    } else {
        format!("{}", rank as u64)
    }
}

/// Escape HTML special characters
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
