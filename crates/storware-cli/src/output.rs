//! Plain-text table rendering for the listing commands.

use storware_core::utils::truncate_string;

/// Cells longer than this are shortened with an ellipsis
const MAX_CELL_WIDTH: usize = 60;

/// Render rows as a grid table:
///
/// ```text
/// +------+------+
/// | Name | GUID |
/// +======+======+
/// | vm-1 | 1234 |
/// +------+------+
/// ```
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let rows: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.iter().map(|cell| truncate_string(cell, MAX_CELL_WIDTH)).collect())
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let border = |fill: char| -> String {
        let mut line = String::from("+");
        for width in &widths {
            line.extend(std::iter::repeat(fill).take(width + 2));
            line.push('+');
        }
        line
    };
    let line = |cells: Vec<&str>| -> String {
        let mut line = String::from("|");
        for (cell, width) in cells.iter().zip(&widths) {
            let padding = width - cell.chars().count();
            line.push(' ');
            line.push_str(cell);
            line.extend(std::iter::repeat(' ').take(padding + 1));
            line.push('|');
        }
        line
    };

    let mut out = vec![border('-'), line(headers.to_vec()), border('=')];
    for row in &rows {
        out.push(line(row.iter().map(String::as_str).collect()));
        out.push(border('-'));
    }
    if rows.is_empty() {
        out.push(border('-'));
    }
    out.join("\n")
}
