//! Terminal output for the CLI.
//!
//! Colored status lines, width-aware truncation and a live spinner that
//! tracks which catalogs have reported.

use owo_colors::OwoColorize;
use std::io::IsTerminal;
use std::time::Duration;

use crate::models::{
    GraphDelta, GraphNode, GraphSnapshot, NodeRole, PaperRecord, ProviderStatus, SourceType,
};

/// Get the current terminal width.
pub fn terminal_width() -> usize {
    terminal_size::terminal_size()
        .map(|(w, _)| w.0 as usize)
        .unwrap_or(100)
}

/// Check if stdout is a terminal.
pub fn is_terminal() -> bool {
    std::io::stdout().is_terminal()
}

pub fn source_icon(source: SourceType) -> &'static str {
    match source {
        SourceType::SemanticScholar => "🧠",
        SourceType::OpenAlex => "🔗",
        SourceType::CrossRef => "📚",
    }
}

pub fn role_icon(role: NodeRole) -> &'static str {
    match role {
        NodeRole::Center => "◉",
        NodeRole::Reference => "→",
        NodeRole::Citation => "←",
        NodeRole::Expanded => "+",
    }
}

/// Status types for colored output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Error,
    Warning,
    Info,
    Pending,
    Search,
}

impl From<ProviderStatus> for Status {
    fn from(status: ProviderStatus) -> Self {
        match status {
            ProviderStatus::Pending => Status::Pending,
            ProviderStatus::Complete => Status::Success,
            ProviderStatus::Failed => Status::Error,
        }
    }
}

pub fn status_icon(status: Status) -> &'static str {
    match status {
        Status::Success => "✓",
        Status::Error => "✗",
        Status::Warning => "⚠",
        Status::Info => "ℹ",
        Status::Pending => "○",
        Status::Search => "🔍",
    }
}

/// Print a colored status line to stderr.
pub fn print_status(status: Status, msg: &str) {
    let icon = status_icon(status);
    match status {
        Status::Success => eprintln!("{} {}", icon.green().bold(), msg),
        Status::Error => eprintln!("{} {}", icon.red().bold(), msg),
        Status::Warning => eprintln!("{} {}", icon.yellow().bold(), msg),
        Status::Info => eprintln!("{} {}", icon.cyan().bold(), msg),
        Status::Pending => eprintln!("{} {}", icon.white().dimmed(), msg),
        Status::Search => eprintln!("{} {}", icon.yellow(), msg),
    }
}

/// Print a section header.
pub fn print_section(title: &str) {
    println!();
    println!("{}", format!("━━━ {} ━━━", title).bold().cyan());
}

/// One search hit, two lines
pub fn print_paper(paper: &PaperRecord) {
    let width = terminal_width().saturating_sub(4);
    let year = paper
        .year_known()
        .map(|y| y.to_string())
        .unwrap_or_else(|| "????".to_string());

    println!(
        "{} {}",
        source_icon(paper.source),
        truncate_with_ellipsis(&paper.title, width).blue().bold()
    );
    println!(
        "   {} {} {} {}",
        truncate_with_ellipsis(&paper.author_line(), width / 2).dimmed(),
        year.yellow(),
        format!("{} citations", format_number(paper.citation_count as usize)).dimmed(),
        paper.doi.as_deref().unwrap_or_default().cyan()
    );
}

pub fn print_graph_node(node: &GraphNode) {
    let width = terminal_width().saturating_sub(12);
    let year = if node.year > 0 {
        node.year.to_string()
    } else {
        "????".to_string()
    };
    println!(
        "  {} {} {} {}",
        role_icon(node.role).cyan(),
        node.id.dimmed(),
        truncate_with_ellipsis(&node.title, width / 2),
        year.yellow()
    );
}

pub fn print_snapshot(snapshot: &GraphSnapshot) {
    print_section(&format!(
        "Citation mesh for {} ({} nodes, {} links)",
        snapshot.center_id,
        format_number(snapshot.nodes.len()),
        format_number(snapshot.edges.len())
    ));
    for node in &snapshot.nodes {
        print_graph_node(node);
    }
}

pub fn print_delta(delta: &GraphDelta) {
    print_section(&format!(
        "Expanded {} (+{} nodes)",
        delta.expanded,
        delta.nodes.len()
    ));
    for node in &delta.nodes {
        print_graph_node(node);
    }
}

/// Format a number with commas.
pub fn format_number(n: usize) -> String {
    n.to_string()
        .chars()
        .rev()
        .collect::<Vec<_>>()
        .chunks(3)
        .map(|c| c.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(",")
        .chars()
        .rev()
        .collect()
}

/// Truncate text to fit within the specified width using unicode-aware truncation.
pub fn truncate_with_ellipsis(text: &str, max_width: usize) -> String {
    if max_width <= 3 {
        return "...".to_string();
    }

    let widths: Vec<(char, usize)> = text
        .chars()
        .map(|c| (c, unicode_width::UnicodeWidthChar::width(c).unwrap_or(1)))
        .collect();

    if widths.iter().map(|(_, w)| *w).sum::<usize>() <= max_width {
        return text.to_string();
    }

    let mut used = 0;
    let mut kept = String::new();
    for (c, w) in widths {
        if used + w > max_width - 3 {
            break;
        }
        used += w;
        kept.push(c);
    }
    format!("{}...", kept.trim_end())
}

fn style(template: &str) -> indicatif::ProgressStyle {
    indicatif::ProgressStyle::with_template(template)
        .unwrap_or_else(|_| indicatif::ProgressStyle::default_spinner())
}

/// Spinner that lists each catalog and marks it off as it reports
pub struct ProviderSpinner {
    pb: indicatif::ProgressBar,
    providers: Vec<(SourceType, ProviderStatus)>,
    papers: usize,
}

impl ProviderSpinner {
    pub fn new(providers: &[SourceType]) -> Self {
        let pb = indicatif::ProgressBar::new(providers.len() as u64);
        pb.set_style(
            style("{spinner:.cyan} {msg} {pos}/{len}").tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "),
        );
        pb.enable_steady_tick(Duration::from_millis(100));

        let spinner = Self {
            pb,
            providers: providers
                .iter()
                .map(|p| (*p, ProviderStatus::Pending))
                .collect(),
            papers: 0,
        };
        spinner.refresh();
        spinner
    }

    pub fn paper_received(&mut self) {
        self.papers += 1;
        self.refresh();
    }

    pub fn settle(&mut self, source: SourceType, status: ProviderStatus) {
        if let Some(entry) = self.providers.iter_mut().find(|(p, _)| *p == source) {
            entry.1 = status;
            self.pb.inc(1);
        }
        self.refresh();
    }

    /// Current spinner line, e.g. `🔬 [✓semantic ○openalex ✗crossref] 4 papers`
    pub fn message(&self) -> String {
        let parts: Vec<String> = self
            .providers
            .iter()
            .map(|(source, status)| format!("{}{}", status_icon((*status).into()), source.id()))
            .collect();
        format!("🔬 [{}] {} papers", parts.join(" "), self.papers)
    }

    fn refresh(&self) {
        self.pb.set_message(self.message());
    }

    /// Hide the spinner while `f` prints
    pub fn suspend<F: FnOnce() -> R, R>(&self, f: F) -> R {
        self.pb.suspend(f)
    }

    pub fn finish(&self, total: usize) {
        self.pb.set_style(style("{msg}"));
        self.pb
            .finish_with_message(format!("✓ Found {} papers", format_number(total)));
    }

    pub fn abandon(&self, msg: &str) {
        self.pb.set_style(style("{msg}"));
        self.pb.abandon_with_message(format!("✗ {}", msg));
    }
}

/// Plain spinner for single long-running operations
pub struct Spinner {
    pb: indicatif::ProgressBar,
}

impl Spinner {
    pub fn new(msg: &str) -> Self {
        let pb = indicatif::ProgressBar::new_spinner();
        pb.set_style(style("{spinner:.cyan} {msg}").tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "));
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        Self { pb }
    }

    pub fn set_message(&self, msg: &str) {
        self.pb.set_message(msg.to_string());
    }

    pub fn finish_and_clear(&self) {
        self.pb.finish_and_clear();
    }
}
