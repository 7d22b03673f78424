//! Output formatting for sync reports

use crate::connector::SyncReport;
use crate::connection::ConnectionOutcome;
use crate::error::{Error, Result};
use crate::inventory::{InventorySnapshot, InventorySource, PluginInfo, ThemeInfo};
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ContentArrangement, Table, presets::UTF8_FULL,
};
use std::cmp::Ordering;
use std::io::Write;
use std::str::FromStr;

/// Output format for results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable table output
    #[default]
    Human,
    /// JSON output
    Json,
    /// No output (silent mode)
    None,
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            "none" => Ok(Self::None),
            _ => Err(Error::InvalidOutputFormat(s.to_string())),
        }
    }
}

/// Sort order for plugin and theme rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputSort {
    /// Sort alphabetically by name (default)
    #[default]
    Name,
    /// Updates first, then active items, then by name
    Status,
}

impl FromStr for OutputSort {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "name" => Ok(Self::Name),
            "status" => Ok(Self::Status),
            _ => Err(Error::InvalidOutputSort(s.to_string())),
        }
    }
}

/// Configuration for output formatting
#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    /// Output format
    pub format: OutputFormat,
    /// Sort order
    pub sort: OutputSort,
}

impl OutputConfig {
    /// Create a new output config
    pub fn new(format: OutputFormat, sort: OutputSort) -> Self {
        Self { format, sort }
    }
}

/// Output the sync report
pub fn output_report<W: Write>(
    report: &SyncReport,
    config: &OutputConfig,
    writer: &mut W,
) -> Result<()> {
    match config.format {
        OutputFormat::Human => output_human(report, config, writer),
        OutputFormat::Json => output_json(report, writer),
        OutputFormat::None => Ok(()),
    }
}

/// Output JSON format
fn output_json<W: Write>(report: &SyncReport, writer: &mut W) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, report)?;
    writeln!(writer).map_err(Error::OutputFailed)?;
    Ok(())
}

/// Output human-readable table format
fn output_human<W: Write>(report: &SyncReport, config: &OutputConfig, writer: &mut W) -> Result<()> {
    writeln!(writer, "{}", summary_table(&report.outcome)).map_err(Error::OutputFailed)?;

    let Some(inventory) = &report.inventory else {
        return Ok(());
    };

    writeln!(writer, "{}", inventory_table(inventory)).map_err(Error::OutputFailed)?;

    if let Some(plugins) = &inventory.detailed_plugins
        && !plugins.is_empty()
    {
        let mut rows: Vec<ComponentRow> = plugins.iter().map(ComponentRow::from).collect();
        sort_rows(&mut rows, config.sort);
        writeln!(writer, "{}", component_table("Plugin", &rows)).map_err(Error::OutputFailed)?;
    }

    if let Some(themes) = &inventory.detailed_themes
        && !themes.is_empty()
    {
        let mut rows: Vec<ComponentRow> = themes.iter().map(ComponentRow::from).collect();
        sort_rows(&mut rows, config.sort);
        writeln!(writer, "{}", component_table("Theme", &rows)).map_err(Error::OutputFailed)?;
    }

    Ok(())
}

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
                .collect::<Vec<_>>(),
        );
    table
}

fn summary_table(outcome: &ConnectionOutcome) -> Table {
    let mut table = new_table(&["Site", "Detail"]);

    let status_cell = if outcome.success {
        Cell::new("Connected").fg(Color::Green)
    } else {
        Cell::new("Failed").fg(Color::Red)
    };
    table.add_row(vec![Cell::new("Status"), status_cell]);
    table.add_row(vec![Cell::new("URL"), Cell::new(&outcome.canonical_site_url)]);

    if outcome.success {
        table.add_row(vec![Cell::new("Name"), Cell::new(&outcome.site_name)]);
        if !outcome.site_description.is_empty() {
            table.add_row(vec![
                Cell::new("Description"),
                Cell::new(&outcome.site_description),
            ]);
        }
        table.add_row(vec![Cell::new("WordPress"), Cell::new(&outcome.wp_version)]);
        table.add_row(vec![
            Cell::new("GMT offset"),
            Cell::new(format!("{:+}", outcome.gmt_offset)),
        ]);
        if let Some(user) = &outcome.authenticated_user {
            table.add_row(vec![Cell::new("User"), Cell::new(user)]);
        }
    }

    if let Some(reason) = outcome.failure_reason {
        table.add_row(vec![
            Cell::new("Reason"),
            Cell::new(reason.to_string()).fg(Color::Yellow),
        ]);
    }
    if let Some(message) = &outcome.failure_message {
        table.add_row(vec![Cell::new("Message"), Cell::new(message)]);
    }

    table
}

fn inventory_table(inventory: &InventorySnapshot) -> Table {
    let mut table = new_table(&["Inventory", "Count"]);

    for (label, count) in [
        ("Plugins", inventory.plugin_count),
        ("Themes", inventory.theme_count),
        ("Posts", inventory.post_count),
    ] {
        table.add_row(vec![
            Cell::new(label),
            Cell::new(count).set_alignment(CellAlignment::Right),
        ]);
    }

    let source_cell = match inventory.source {
        InventorySource::PrivilegedExtension => Cell::new("Extension").fg(Color::Green),
        InventorySource::StandardRestApi => Cell::new("REST API").fg(Color::Green),
        InventorySource::HtmlFingerprint => Cell::new("HTML").fg(Color::Yellow),
        InventorySource::Unavailable => Cell::new("Unavailable").fg(Color::DarkGrey),
    };
    table.add_row(vec![Cell::new("Source"), source_cell]);

    if let Some(version) = &inventory.php_version {
        table.add_row(vec![Cell::new("PHP"), Cell::new(version)]);
    }
    if let Some(reason) = inventory.failure_reason {
        table.add_row(vec![
            Cell::new("Reason"),
            Cell::new(reason.to_string()).fg(Color::Yellow),
        ]);
    }

    table
}

/// Plugin or theme reduced to what the table shows
#[derive(Debug)]
struct ComponentRow<'a> {
    name: &'a str,
    version: &'a str,
    latest_version: Option<&'a str>,
    active: bool,
    update_available: bool,
}

impl<'a> From<&'a PluginInfo> for ComponentRow<'a> {
    fn from(plugin: &'a PluginInfo) -> Self {
        Self {
            name: display_name(&plugin.name, &plugin.slug),
            version: &plugin.version,
            latest_version: plugin.latest_version.as_deref(),
            active: plugin.active,
            update_available: plugin.update_available,
        }
    }
}

impl<'a> From<&'a ThemeInfo> for ComponentRow<'a> {
    fn from(theme: &'a ThemeInfo) -> Self {
        Self {
            name: display_name(&theme.name, &theme.slug),
            version: &theme.version,
            latest_version: theme.latest_version.as_deref(),
            active: theme.active,
            update_available: theme.update_available,
        }
    }
}

fn display_name<'a>(name: &'a str, slug: &'a str) -> &'a str {
    if name.is_empty() { slug } else { name }
}

fn by_name(a: &ComponentRow<'_>, b: &ComponentRow<'_>) -> Ordering {
    a.name.to_lowercase().cmp(&b.name.to_lowercase())
}

fn sort_rows(rows: &mut [ComponentRow<'_>], sort: OutputSort) {
    match sort {
        OutputSort::Name => rows.sort_by(by_name),
        // Updates first, then active, then by name
        OutputSort::Status => rows.sort_by(|a, b| {
            b.update_available
                .cmp(&a.update_available)
                .then_with(|| b.active.cmp(&a.active))
                .then_with(|| by_name(a, b))
        }),
    }
}

fn component_table(kind: &str, rows: &[ComponentRow<'_>]) -> Table {
    let mut table = new_table(&[kind, "Version", "Latest", "Active", "Status"]);

    for row in rows {
        let active_cell = if row.active {
            Cell::new("Yes").fg(Color::Green)
        } else {
            Cell::new("No").fg(Color::DarkGrey)
        };
        let status_cell = if row.update_available {
            Cell::new("Update").fg(Color::Yellow)
        } else {
            Cell::new("Ok").fg(Color::Green)
        };

        table.add_row(vec![
            Cell::new(row.name),
            Cell::new(if row.version.is_empty() { "-" } else { row.version }),
            Cell::new(row.latest_version.unwrap_or("-")),
            active_cell.set_alignment(CellAlignment::Center),
            status_cell.set_alignment(CellAlignment::Center),
        ]);
    }

    table
}
