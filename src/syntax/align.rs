//! Column alignment for printer output, modelled on `text/tabwriter`.
//!
//! The printer separates alignable cells with `\v` and starts a new section
//! with a form feed at the beginning of a line. Consecutive non-empty lines
//! with the same indentation form one section. Inside a section every column
//! block is padded to its widest cell plus one blank; columns whose cells are
//! all empty take no space.

pub(super) const CELL: char = '\u{b}';
pub(super) const FORMFEED: char = '\u{c}';

const PADDING: usize = 1;

struct Line<'a> {
    indent: usize,
    cells: Vec<&'a str>,
}

pub(super) fn align(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut section: Vec<Line> = Vec::new();
    for raw in text.split_terminator('\n') {
        let (formfeed, rest) = match raw.strip_prefix(FORMFEED) {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        let body = rest.trim_start_matches('\t');
        let indent = rest.len() - body.len();
        let continues =
            !formfeed && !body.is_empty() && section.last().is_some_and(|l| l.indent == indent);
        if !continues {
            flush(&mut section, &mut out);
        }
        if body.is_empty() {
            out.push_str(rest);
            out.push('\n');
            continue;
        }
        section.push(Line {
            indent,
            cells: body.split(CELL).collect(),
        });
    }
    flush(&mut section, &mut out);
    out
}

fn flush(section: &mut Vec<Line>, out: &mut String) {
    let mut widths: Vec<Vec<usize>> = section.iter().map(|l| vec![0; l.cells.len()]).collect();
    format(section, 0, 0, section.len(), &mut widths);
    for (line, widths) in section.iter().zip(&widths) {
        out.extend(std::iter::repeat_n('\t', line.indent));
        let start = out.len();
        let last = line.cells.len() - 1;
        for (column, cell) in line.cells.iter().enumerate() {
            out.push_str(cell);
            if column < last {
                let used = cell.chars().count();
                out.extend(std::iter::repeat_n(' ', widths[column].saturating_sub(used)));
            }
        }
        if last > 0 {
            let kept = out[start..].trim_end_matches(' ').len();
            out.truncate(start + kept);
        }
        out.push('\n');
    }
    section.clear();
}

/// Assigns widths to `column` for each block of lines in `line0..line1` that
/// has a terminated cell in that column, then recurses into the next column.
fn format(lines: &[Line], column: usize, line0: usize, line1: usize, widths: &mut [Vec<usize>]) {
    let mut this = line0;
    while this < line1 {
        if column + 1 >= lines[this].cells.len() {
            this += 1;
            continue;
        }
        let start = this;
        let mut width = 0;
        let mut discardable = true;
        while this < line1 && column + 1 < lines[this].cells.len() {
            let used = lines[this].cells[column].chars().count();
            width = width.max(used + PADDING);
            if used > 0 {
                discardable = false;
            }
            this += 1;
        }
        if discardable {
            width = 0;
        }
        for row in &mut widths[start..this] {
            row[column] = width;
        }
        format(lines, column + 1, start, this, widths);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligns_trailing_comments_of_consecutive_lines() {
        let text = "\ta := 1\u{b}// one\n\tbbb := 2\u{b}// two\n";
        assert_eq!(align(text), "\ta := 1   // one\n\tbbb := 2 // two\n");
    }

    #[test]
    fn formfeed_starts_a_new_section() {
        let text = "a\u{b}// x\n\u{c}bbbbb\u{b}// y\n";
        assert_eq!(align(text), "a // x\nbbbbb // y\n");
    }

    #[test]
    fn blank_lines_and_indentation_changes_break_sections() {
        let text = "a\u{b}1\n\nbbbb\u{b}2\n\tcc\u{b}3\n";
        assert_eq!(align(text), "a 1\n\nbbbb 2\n\tcc 3\n");
    }

    #[test]
    fn empty_columns_are_discarded() {
        let text = "A\u{b}\u{b}// c\nBB\u{b}\u{b}// d\n";
        assert_eq!(align(text), "A  // c\nBB // d\n");
    }

    #[test]
    fn nested_columns_only_span_lines_that_have_them() {
        let text = "Name\u{b}string\u{b}`json:\"name\"`\nAge\u{b}int\nID\u{b}int\u{b}`json:\"id\"`\n";
        assert_eq!(
            align(text),
            "Name string `json:\"name\"`\nAge  int\nID   int `json:\"id\"`\n"
        );
    }
}
