use ratatui::layout::{Constraint, Direction, Layout, Rect};

pub fn split_vertical(area: Rect, constraints: &[Constraint]) -> Vec<Rect> {
    split(area, Direction::Vertical, constraints)
}

pub fn split_horizontal(area: Rect, constraints: &[Constraint]) -> Vec<Rect> {
    split(area, Direction::Horizontal, constraints)
}

/// `count` equal-width columns.
pub fn split_columns(area: Rect, count: usize) -> Vec<Rect> {
    if count == 0 {
        return Vec::new();
    }
    let share = u32::try_from(count).unwrap_or(u32::MAX);
    let constraints = vec![Constraint::Ratio(1, share); count];
    split_horizontal(area, &constraints)
}

fn split(area: Rect, direction: Direction, constraints: &[Constraint]) -> Vec<Rect> {
    Layout::default()
        .direction(direction)
        .constraints(constraints.to_vec())
        .split(area)
        .to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_cover_the_whole_row() {
        let area = Rect::new(0, 0, 80, 6);
        let columns = split_columns(area, 4);
        assert_eq!(columns.len(), 4);
        assert_eq!(columns.iter().map(|r| r.width).sum::<u16>(), 80);
        assert!(columns.iter().all(|r| r.height == 6));
        assert!(split_columns(area, 0).is_empty());
    }
}
