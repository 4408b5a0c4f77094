//! Rendering diagnostics as text.
//!
//! [`render_short`] gives the one-line `file:line:col: severity: message`
//! form. [`TerminalRenderer`] prints the full form with the offending source
//! line and an underline, colored through any [`WriteColor`] sink.

use crate::span::{Label, LabelStyle, LineColumn, ResolvedSpan, SourceSpan};
use crate::{Diagnostic, DiagnosticError, DiagnosticResult, Severity};
use rustc_hash::FxHashMap;
use termcolor::{Color, ColorSpec, WriteColor};
use unicode_width::UnicodeWidthStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorMode {
    #[default]
    Standard,
    /// Colorblind-safe palette.
    Cvd,
}

#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub color_mode: ColorMode,
    /// Longer source lines are truncated with `...`.
    pub max_width: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            color_mode: ColorMode::Standard,
            max_width: 120,
        }
    }
}

/// Source text by file name.
#[derive(Debug, Default)]
pub struct SourceCache {
    files: FxHashMap<String, String>,
}

impl SourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_source(&mut self, file: impl Into<String>, source: impl Into<String>) {
        self.files.insert(file.into(), source.into());
    }

    pub fn get_source(&self, file: &str) -> Option<&str> {
        self.files.get(file).map(String::as_str)
    }

    pub fn resolve_span(&self, span: &SourceSpan) -> Option<ResolvedSpan> {
        let source = self.get_source(&span.file)?;
        let start = offset_to_line_col(source, span.start);
        let end = offset_to_line_col(source, span.end);
        let source_lines = source
            .lines()
            .skip(start.line - 1)
            .take(end.line - start.line + 1)
            .map(String::from)
            .collect();
        Some(ResolvedSpan {
            span: span.clone(),
            start,
            end,
            source_lines,
        })
    }
}

/// 1-based line and character column of a byte offset. Offsets past the end
/// clamp to the end of the source.
pub fn offset_to_line_col(source: &str, offset: usize) -> LineColumn {
    let offset = offset.min(source.len());
    let before = source.get(..offset).unwrap_or(source);
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let column = before[line_start..].chars().count() + 1;
    LineColumn::new(line, column)
}

/// `file:line:col: severity: message`.
pub fn render_short(diagnostic: &Diagnostic, sources: &SourceCache) -> String {
    let location = diagnostic.primary_span().map(|span| {
        match sources.resolve_span(span) {
            Some(resolved) => format!(
                "{}:{}:{}",
                span.file, resolved.start.line, resolved.start.column
            ),
            None => span.file.clone(),
        }
    });
    match location {
        Some(location) => format!(
            "{}: {}: {}",
            location, diagnostic.severity, diagnostic.message
        ),
        None => format!("{}: {}", diagnostic.severity, diagnostic.message),
    }
}

/// Full diagnostic output to a [`WriteColor`] sink.
pub struct TerminalRenderer<W> {
    config: RenderConfig,
    out: W,
}

impl<W: WriteColor> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self::with_config(out, RenderConfig::default())
    }

    pub fn with_config(out: W, config: RenderConfig) -> Self {
        Self { config, out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Render every diagnostic followed by a summary line.
    pub fn render_all(
        &mut self,
        diagnostics: &[Diagnostic],
        sources: &SourceCache,
    ) -> DiagnosticResult<()> {
        for diagnostic in diagnostics {
            self.render(diagnostic, sources)?;
        }
        self.render_summary(diagnostics)
    }

    pub fn render(&mut self, diagnostic: &Diagnostic, sources: &SourceCache) -> DiagnosticResult<()> {
        self.write_header(diagnostic)?;

        if let Some(primary) = diagnostic.primary_span() {
            let resolved = sources
                .resolve_span(primary)
                .ok_or_else(|| DiagnosticError::SourceNotFound(primary.file.clone()))?;
            let gutter = resolved.end.line.to_string().len().max(2);
            writeln!(
                self.out,
                "{:gutter$}--> {}:{}:{}",
                "",
                primary.file,
                resolved.start.line,
                resolved.start.column,
                gutter = gutter
            )?;
            self.write_gutter(gutter, None)?;
            writeln!(self.out)?;

            let labels = diagnostic.spans.labels();
            if labels.is_empty() {
                self.write_snippet(&resolved, None, diagnostic.severity, gutter)?;
            }
            for label in labels {
                if let Some(label_resolved) = sources.resolve_span(&label.span) {
                    self.write_snippet(&label_resolved, Some(label), diagnostic.severity, gutter)?;
                }
            }
        }

        for child in &diagnostic.children {
            let color = self.severity_color(child.severity);
            write!(self.out, "  = ")?;
            self.write_colored(child.severity.as_str(), color, true)?;
            writeln!(self.out, ": {}", child.message)?;
        }
        writeln!(self.out)?;
        Ok(())
    }

    pub fn render_summary(&mut self, diagnostics: &[Diagnostic]) -> DiagnosticResult<()> {
        let errors = diagnostics.iter().filter(|d| d.is_error()).count();
        let warnings = diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count();
        if errors > 0 {
            self.write_colored("error", self.severity_color(Severity::Error), true)?;
            writeln!(self.out, ": {} {} found", errors, plural(errors, "error"))?;
        } else if warnings > 0 {
            self.write_colored("warning", self.severity_color(Severity::Warning), true)?;
            writeln!(self.out, ": {} {} found", warnings, plural(warnings, "warning"))?;
        }
        Ok(())
    }

    fn severity_color(&self, severity: Severity) -> Color {
        match (self.config.color_mode, severity) {
            (ColorMode::Standard, Severity::Error) => Color::Red,
            (ColorMode::Standard, Severity::Warning) => Color::Yellow,
            (ColorMode::Standard, Severity::Note) => Color::Cyan,
            (ColorMode::Standard, Severity::Help) => Color::Green,
            (ColorMode::Cvd, Severity::Error) => Color::Rgb(213, 94, 0),
            (ColorMode::Cvd, Severity::Warning) => Color::Rgb(240, 228, 66),
            (ColorMode::Cvd, Severity::Note | Severity::Help) => Color::Rgb(0, 114, 178),
        }
    }

    fn write_colored(&mut self, text: &str, color: Color, bold: bool) -> DiagnosticResult<()> {
        let mut spec = ColorSpec::new();
        spec.set_fg(Some(color)).set_bold(bold);
        self.out.set_color(&spec)?;
        write!(self.out, "{}", text)?;
        self.out.reset()?;
        Ok(())
    }

    /// `error[P2001]: message`
    fn write_header(&mut self, diagnostic: &Diagnostic) -> DiagnosticResult<()> {
        let color = self.severity_color(diagnostic.severity);
        let mut header = diagnostic.severity.as_str().to_string();
        if let Some(code) = &diagnostic.code {
            header.push('[');
            header.push_str(code);
            header.push(']');
        }
        self.write_colored(&header, color, true)?;
        writeln!(self.out, ": {}", diagnostic.message)?;
        Ok(())
    }

    fn write_gutter(&mut self, width: usize, line: Option<usize>) -> DiagnosticResult<()> {
        let number = line.map(|n| n.to_string()).unwrap_or_default();
        self.write_colored(&format!("{:>width$} |", number, width = width), Color::Blue, true)
    }

    /// The first line of `resolved`, then an underline with the label text.
    fn write_snippet(
        &mut self,
        resolved: &ResolvedSpan,
        label: Option<&Label>,
        severity: Severity,
        gutter: usize,
    ) -> DiagnosticResult<()> {
        let Some(line) = resolved.source_lines.first() else {
            return Ok(());
        };
        self.write_gutter(gutter, Some(resolved.start.line))?;
        let shown = self.truncate(line);
        writeln!(self.out, " {}", shown)?;

        let prefix: String = line.chars().take(resolved.start.column - 1).collect();
        let covered: String = if resolved.is_multiline() {
            line.chars().skip(resolved.start.column - 1).collect()
        } else {
            line.chars()
                .skip(resolved.start.column - 1)
                .take(resolved.end.column.saturating_sub(resolved.start.column))
                .collect()
        };
        let pad = prefix.width();
        let len = covered.width().max(1);

        let (marker, color) = match label.map_or(LabelStyle::Primary, |l| l.style) {
            LabelStyle::Primary => (primary_marker(severity), self.severity_color(severity)),
            LabelStyle::Secondary => ('-', Color::Blue),
        };
        self.write_gutter(gutter, None)?;
        write!(self.out, " {:pad$}", "", pad = pad)?;
        let mut underline: String = std::iter::repeat(marker).take(len).collect();
        if let Some(label) = label.filter(|l| !l.message.is_empty()) {
            underline.push(' ');
            underline.push_str(&label.message);
        }
        self.write_colored(&underline, color, true)?;
        writeln!(self.out)?;
        Ok(())
    }

    fn truncate<'a>(&self, line: &'a str) -> std::borrow::Cow<'a, str> {
        if line.width() <= self.config.max_width {
            return line.into();
        }
        let mut out = String::new();
        let mut width = 0;
        for ch in line.chars() {
            let w = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
            if width + w > self.config.max_width.saturating_sub(3) {
                break;
            }
            width += w;
            out.push(ch);
        }
        out.push_str("...");
        out.into()
    }
}

fn primary_marker(severity: Severity) -> char {
    match severity {
        Severity::Error => '^',
        Severity::Warning => '~',
        Severity::Note | Severity::Help => '-',
    }
}

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        word.to_string()
    } else {
        format!("{}s", word)
    }
}
