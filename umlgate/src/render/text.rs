//! Bundled sequence-diagram engine.
//!
//! Understands a small subset of sequence diagrams: `participant`/`actor`
//! declarations and `A -> B : label` / `A <- B : label` messages. Blank lines,
//! `'` comments and `!` preprocessor lines are skipped; includes are never
//! resolved here.
//!
//! ```text
//!      ,---.          ,-----.
//!      |Bob|          |Alice|
//!      `-+-'          `--+--'
//!        |    hello      |
//!        |-------------->|
//!      ,-+-.          ,--+--.
//!      |Bob|          |Alice|
//!      `---'          `-----'
//! ```

use super::{OutputFormat, RenderAdapter};
use crate::{diagram, error::EngineError};
use regex::Regex;
use std::sync::OnceLock;
use tokio_util::sync::CancellationToken;

const LEFT_MARGIN: usize = 5;
const LABEL_OFFSET: usize = 5;
const SPACING: usize = 11;

const SVG_CHAR_WIDTH: usize = 9;
const SVG_LINE_HEIGHT: usize = 17;

struct Glyphs {
    top_left: char,
    top_right: char,
    bottom_left: char,
    bottom_right: char,
    horizontal: char,
    vertical: char,
    tee_down: char,
    tee_up: char,
}

const ASCII: Glyphs = Glyphs {
    top_left: ',',
    top_right: '.',
    bottom_left: '`',
    bottom_right: '\'',
    horizontal: '-',
    vertical: '|',
    tee_down: '+',
    tee_up: '+',
};

const UNICODE: Glyphs = Glyphs {
    top_left: '┌',
    top_right: '┐',
    bottom_left: '└',
    bottom_right: '┘',
    horizontal: '─',
    vertical: '│',
    tee_down: '┬',
    tee_up: '┴',
};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Message {
    from: usize,
    to: usize,
    label: String,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct SequenceDiagram {
    participants: Vec<String>,
    messages: Vec<Message>,
}

impl SequenceDiagram {
    fn participant(&mut self, name: &str) -> usize {
        match self.participants.iter().position(|p| p == name) {
            Some(idx) => idx,
            None => {
                self.participants.push(name.to_string());
                self.participants.len() - 1
            }
        }
    }
}

/// Renders simple sequence diagrams as ASCII, Unicode or SVG.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceTextEngine;

impl SequenceTextEngine {
    pub fn new() -> Self {
        Self
    }
}

impl RenderAdapter for SequenceTextEngine {
    fn name(&self) -> &str {
        "sequence-text"
    }

    fn render(
        &self,
        source: &str,
        format: OutputFormat,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, EngineError> {
        let diagram = parse(source)?;
        if cancel.is_cancelled() {
            return Err(EngineError::Failed("render cancelled".to_string()));
        }

        let bytes = match format {
            OutputFormat::Txt => join_rows(&draw(&diagram, &ASCII)).into_bytes(),
            OutputFormat::Utxt => join_rows(&draw(&diagram, &UNICODE)).into_bytes(),
            OutputFormat::Svg => to_svg(source, &draw(&diagram, &UNICODE)).into_bytes(),
        };
        Ok(bytes)
    }
}

fn message_rx() -> &'static Regex {
    static RX: OnceLock<Regex> = OnceLock::new();
    RX.get_or_init(|| {
        Regex::new(r"^([A-Za-z0-9_.]+)\s*(->|<-)\s*([A-Za-z0-9_.]+)\s*(?::\s*(.*?))?\s*$")
            .expect("message regex must compile")
    })
}

fn participant_rx() -> &'static Regex {
    static RX: OnceLock<Regex> = OnceLock::new();
    RX.get_or_init(|| {
        Regex::new(r"^(?:participant|actor)\s+([A-Za-z0-9_.]+)$")
            .expect("participant regex must compile")
    })
}

fn syntax_error(line: usize) -> EngineError {
    EngineError::Syntax(format!("Syntax Error? (line: {line})"))
}

fn parse(source: &str) -> Result<SequenceDiagram, EngineError> {
    let block = diagram::locate(source)
        .ok_or_else(|| EngineError::Failed("missing @start/@end delimiters".to_string()))?;
    if block.kind != "uml" {
        return Err(EngineError::Failed(format!(
            "diagram type '@start{}' is not supported",
            block.kind
        )));
    }

    let mut diagram = SequenceDiagram::default();
    for (line_number, raw) in block.numbered_body() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('\'') || line.starts_with('!') {
            continue;
        }

        if let Some(caps) = participant_rx().captures(line) {
            diagram.participant(&caps[1]);
            continue;
        }

        let caps = message_rx()
            .captures(line)
            .ok_or_else(|| syntax_error(line_number))?;
        let (left, right) = (&caps[1], &caps[3]);
        if left == right {
            return Err(EngineError::Failed(format!(
                "self messages are not supported (line: {line_number})"
            )));
        }
        let (from, to) = match &caps[2] {
            "->" => (diagram.participant(left), diagram.participant(right)),
            _ => {
                let to = diagram.participant(left);
                (diagram.participant(right), to)
            }
        };
        diagram.messages.push(Message {
            from,
            to,
            label: caps.get(4).map_or("", |m| m.as_str()).to_string(),
        });
    }
    Ok(diagram)
}

/// Lifeline columns and total width.
fn layout(diagram: &SequenceDiagram) -> (Vec<usize>, usize) {
    let widths: Vec<usize> = diagram
        .participants
        .iter()
        .map(|name| name.chars().count() + 2)
        .collect();

    let mut gaps = vec![0; widths.len()];
    for i in 1..widths.len() {
        let left = widths[i - 1];
        gaps[i] = (left - 1 - left / 2) + widths[i] / 2 + SPACING;
    }

    for message in &diagram.messages {
        let (a, b) = (message.from.min(message.to), message.from.max(message.to));
        let needed = message.label.chars().count() + SPACING;
        let span: usize = gaps[a + 1..=b].iter().sum();
        if span < needed {
            gaps[b] += needed - span;
        }
    }

    let mut centers = Vec::with_capacity(widths.len());
    for (i, width) in widths.iter().enumerate() {
        let center = match i {
            0 => LEFT_MARGIN + width / 2,
            _ => centers[i - 1] + gaps[i],
        };
        centers.push(center);
    }

    let total = match (centers.last(), widths.last()) {
        (Some(center), Some(width)) => center + (width - width / 2),
        _ => 0,
    };
    (centers, total)
}

fn draw(diagram: &SequenceDiagram, glyphs: &Glyphs) -> Vec<Vec<char>> {
    if diagram.participants.is_empty() {
        return vec![Vec::new()];
    }

    let (centers, width) = layout(diagram);
    let mut rows: Vec<Vec<char>> = Vec::new();

    push_boxes(&mut rows, diagram, &centers, width, glyphs, BoxEnd::Head);

    for message in &diagram.messages {
        let (a, b) = (message.from.min(message.to), message.from.max(message.to));

        if !message.label.is_empty() {
            let mut row = lifelines(&centers, width, glyphs);
            for (offset, c) in message.label.chars().enumerate() {
                if let Some(cell) = row.get_mut(centers[a] + LABEL_OFFSET + offset) {
                    *cell = c;
                }
            }
            rows.push(row);
        }

        let mut row = lifelines(&centers, width, glyphs);
        for cell in &mut row[centers[a] + 1..centers[b]] {
            *cell = glyphs.horizontal;
        }
        if message.from < message.to {
            row[centers[b] - 1] = '>';
        } else {
            row[centers[a] + 1] = '<';
        }
        rows.push(row);
    }

    push_boxes(&mut rows, diagram, &centers, width, glyphs, BoxEnd::Foot);
    rows
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum BoxEnd {
    Head,
    Foot,
}

fn push_boxes(
    rows: &mut Vec<Vec<char>>,
    diagram: &SequenceDiagram,
    centers: &[usize],
    width: usize,
    glyphs: &Glyphs,
    end: BoxEnd,
) {
    let mut top = vec![' '; width];
    let mut middle = vec![' '; width];
    let mut bottom = vec![' '; width];

    for (name, &center) in diagram.participants.iter().zip(centers) {
        let box_width = name.chars().count() + 2;
        let left = center - box_width / 2;
        let right = left + box_width - 1;

        for col in left + 1..right {
            top[col] = glyphs.horizontal;
            bottom[col] = glyphs.horizontal;
        }
        top[left] = glyphs.top_left;
        top[right] = glyphs.top_right;
        bottom[left] = glyphs.bottom_left;
        bottom[right] = glyphs.bottom_right;

        middle[left] = glyphs.vertical;
        middle[right] = glyphs.vertical;
        for (offset, c) in name.chars().enumerate() {
            middle[left + 1 + offset] = c;
        }

        match end {
            BoxEnd::Head => bottom[center] = glyphs.tee_down,
            BoxEnd::Foot => top[center] = glyphs.tee_up,
        }
    }

    rows.extend([top, middle, bottom]);
}

fn lifelines(centers: &[usize], width: usize, glyphs: &Glyphs) -> Vec<char> {
    let mut row = vec![' '; width];
    for &center in centers {
        row[center] = glyphs.vertical;
    }
    row
}

fn join_rows(rows: &[Vec<char>]) -> String {
    let mut out = String::new();
    for row in rows {
        out.extend(row.iter());
        out.push('\n');
    }
    out
}

fn to_svg(source: &str, rows: &[Vec<char>]) -> String {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let width = (columns * SVG_CHAR_WIDTH).max(SVG_CHAR_WIDTH);
    let height = (rows.len() + 1) * SVG_LINE_HEIGHT;

    let mut svg = String::new();
    svg.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?>");
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" \
         viewBox=\"0 0 {width} {height}\">"
    ));
    svg.push_str(&format!("<!--\n{}\n-->", escape_comment(source.trim_end())));
    svg.push_str("<rect width=\"100%\" height=\"100%\" fill=\"#FFFFFF\"/>");
    svg.push_str("<text font-family=\"monospace\" font-size=\"14\" xml:space=\"preserve\">");
    for (idx, row) in rows.iter().enumerate() {
        let text: String = row.iter().collect();
        svg.push_str(&format!(
            "<tspan x=\"0\" y=\"{}\">{}</tspan>",
            (idx + 1) * SVG_LINE_HEIGHT,
            escape_xml(&text)
        ));
    }
    svg.push_str("</text></svg>");
    svg
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// `--` may not appear inside an XML comment.
fn escape_comment(text: &str) -> String {
    let mut escaped = text.to_string();
    while escaped.contains("--") {
        escaped = escaped.replace("--", "- -");
    }
    escaped
}
