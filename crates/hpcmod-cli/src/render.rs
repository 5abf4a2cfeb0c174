use std::io::IsTerminal;
use std::time::{Duration, Instant};

use anstyle::{AnsiColor, Effects, Style};
use hpcmod_lifecycle::BatchReport;
use indicatif::{HumanCount, ProgressBar, ProgressStyle};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

/// Whether a batch draws a live bar on stderr.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum BatchProgressMode {
    Disabled,
    Bar,
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct TerminalRenderer {
    style: OutputStyle,
}

pub(crate) struct TerminalProgress {
    style: OutputStyle,
    label: &'static str,
    total: u64,
    done: u64,
    bar: Option<ProgressBar>,
    started_at: Instant,
}

impl TerminalRenderer {
    pub(crate) fn from_style(style: OutputStyle) -> Self {
        Self { style }
    }

    pub(crate) fn current() -> Self {
        Self::from_style(current_output_style())
    }

    pub(crate) fn style(self) -> OutputStyle {
        self.style
    }

    pub(crate) fn print_status(self, status: &str, message: &str) {
        println!("{}", render_status_line(self.style, status, message));
    }

    pub(crate) fn print_section(self, title: &str) {
        if self.style == OutputStyle::Plain {
            return;
        }
        println!();
        println!("{}", colorize(section_style(), &format!("== {title} ==")));
    }

    pub(crate) fn print_lines(self, lines: &[String]) {
        for line in lines {
            println!("{line}");
        }
    }

    /// Progress over `total` installed software.
    pub(crate) fn start_progress(
        self,
        mode: BatchProgressMode,
        label: &'static str,
        total: u64,
    ) -> TerminalProgress {
        let bar = (mode == BatchProgressMode::Bar).then(|| batch_progress_bar(label, total));
        TerminalProgress {
            style: self.style,
            label,
            total,
            done: 0,
            bar,
            started_at: Instant::now(),
        }
    }
}

fn batch_progress_bar(label: &str, total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total.max(1));
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.cyan.bold} {prefix:<10} [{bar:24.cyan/blue}] {pos:>3}/{len:3} {elapsed}",
    ) {
        bar.set_style(style.tick_chars(batch_tick_chars(label)).progress_chars("#>-"));
    }
    bar.set_prefix(label.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

impl TerminalProgress {
    pub(crate) fn set(&mut self, done: u64) {
        self.done = done.min(self.total);
        if let Some(bar) = &self.bar {
            bar.set_position(self.done);
        }
    }

    pub(crate) fn finish_success(mut self) {
        let Some(bar) = self.bar.take() else {
            return;
        };
        bar.finish_and_clear();
        if let Some(line) = render_batch_done_line(
            self.style,
            self.label,
            self.done,
            self.total,
            self.started_at.elapsed(),
        ) {
            println!("{line}");
        }
    }

    /// Clears the bar without a completion line.
    pub(crate) fn finish_abandon(mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

pub(crate) fn current_output_style() -> OutputStyle {
    resolve_output_style(std::io::stdout().is_terminal())
}

pub(crate) fn resolve_output_style(stdout_is_tty: bool) -> OutputStyle {
    if stdout_is_tty {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

/// The bar shares stderr with confirmation prompts, so it is only drawn when
/// no prompt can be raised.
pub(crate) fn resolve_batch_progress_mode(
    style: OutputStyle,
    may_prompt: bool,
) -> BatchProgressMode {
    if style == OutputStyle::Plain || may_prompt {
        return BatchProgressMode::Disabled;
    }
    BatchProgressMode::Bar
}

pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    if style == OutputStyle::Plain {
        return message.to_string();
    }
    match status_badge(status) {
        Some(badge) => format!("{badge} {message}"),
        None => message.to_string(),
    }
}

fn status_badge(status: &str) -> Option<&'static str> {
    match status {
        "ok" => Some("[OK]"),
        "warn" => Some("[WARN]"),
        "err" => Some("[ERR]"),
        "step" => Some("[..]"),
        _ => None,
    }
}

/// Batch report lines, badged by outcome in rich output.
pub(crate) fn format_batch_output_lines(report: &BatchReport, style: OutputStyle) -> Vec<String> {
    if style == OutputStyle::Plain {
        return report.lines.clone();
    }
    report
        .lines
        .iter()
        .map(|line| render_status_line(style, batch_line_status(line), line))
        .collect()
}

fn batch_line_status(line: &str) -> &'static str {
    if line.contains(": failed") {
        "err"
    } else if line.contains(": skipped") {
        "warn"
    } else if line.ends_with(": up-to-date") || line.ends_with(" available") {
        "step"
    } else {
        "ok"
    }
}

fn batch_tick_chars(label: &str) -> &'static str {
    match label {
        "upgrade" => "-=~* ",
        "reinstall" => ".oO@* ",
        _ => "|/-\\ ",
    }
}

fn section_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightBlue.into()))
        .effects(Effects::BOLD)
}

fn label_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightCyan.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

/// `upgrade done: 3/4 software in 1.250s`, rich output only.
pub(crate) fn render_batch_done_line(
    style: OutputStyle,
    label: &str,
    done: u64,
    total: u64,
    elapsed: Duration,
) -> Option<String> {
    if style == OutputStyle::Plain {
        return None;
    }
    Some(format!(
        "{} done: {}/{} software in {}.{:03}s",
        colorize(label_style(), label),
        HumanCount(done),
        HumanCount(total),
        elapsed.as_secs(),
        elapsed.subsec_millis()
    ))
}
