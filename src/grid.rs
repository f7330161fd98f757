//! 9x9 mandala chart composition
//!
//! The board is nine 3x3 blocks. The center block holds the primary goal
//! surrounded by mirrors of the eight sub-goals; each outer block belongs
//! to one sub-goal slot, with the sub-goal at the block center surrounded
//! by its eight actions. The same slot index orders both tables, so a
//! sub-goal's mirror and its block sit in the same compass direction.

use crate::color;
use crate::db::{GoalTree, SubGoalTree};
use crate::views::{GridCellView, GridView};

/// The 8 cells around a center in reading order (NW, N, NE, W, E, SW, S,
/// SE), indexed by position - 1.
pub const SLOT_OFFSETS: [(i8, i8); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Top-left corner of each outer 3x3 block in reading order (the center
/// block is skipped), indexed by sub-goal position - 1.
pub const BLOCK_ANCHORS: [(u8, u8); 8] = [
    (0, 0),
    (0, 3),
    (0, 6),
    (3, 0),
    (3, 6),
    (6, 0),
    (6, 3),
    (6, 6),
];

/// What a given board coordinate displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    PrimaryCenter,
    SubGoalMirror(u8),
    SubGoalCenter(u8),
    Action(u8, u8),
}

/// Map a coordinate to its structural cell. `None` only for coordinates
/// off the 9x9 board.
pub fn cell_at(row: u8, col: u8) -> Option<Cell> {
    if row > 8 || col > 8 {
        return None;
    }
    let in_row = (row % 3) as i8 - 1;
    let in_col = (col % 3) as i8 - 1;

    if row / 3 == 1 && col / 3 == 1 {
        if in_row == 0 && in_col == 0 {
            return Some(Cell::PrimaryCenter);
        }
        return offset_position(in_row, in_col).map(Cell::SubGoalMirror);
    }

    let anchor = (row - row % 3, col - col % 3);
    let sub_position = BLOCK_ANCHORS.iter().position(|&a| a == anchor)? as u8 + 1;
    if in_row == 0 && in_col == 0 {
        return Some(Cell::SubGoalCenter(sub_position));
    }
    offset_position(in_row, in_col).map(|p| Cell::Action(sub_position, p))
}

fn offset_position(dr: i8, dc: i8) -> Option<u8> {
    SLOT_OFFSETS
        .iter()
        .position(|&o| o == (dr, dc))
        .map(|i| i as u8 + 1)
}

/// Render a goal tree as the full 81-cell board, vacant slots included.
pub fn compose(tree: &GoalTree) -> GridView {
    let mut subs: [Option<&SubGoalTree>; 8] = [None; 8];
    for st in &tree.sub_goals {
        let idx = (st.sub_goal.position - 1) as usize;
        if idx < subs.len() {
            subs[idx] = Some(st);
        }
    }

    let mut cells = Vec::with_capacity(81);
    for row in 0..9u8 {
        for col in 0..9u8 {
            if let Some(cell) = cell_at(row, col) {
                cells.push(render_cell(tree, &subs, row, col, cell));
            }
        }
    }

    GridView {
        goal_id: tree.goal.id.clone(),
        goal_title: tree.goal.title.clone(),
        cells,
    }
}

fn render_cell(
    tree: &GoalTree,
    subs: &[Option<&SubGoalTree>; 8],
    row: u8,
    col: u8,
    cell: Cell,
) -> GridCellView {
    match cell {
        Cell::PrimaryCenter => GridCellView {
            row,
            col,
            kind: "primary".to_string(),
            id: Some(tree.goal.id.clone()),
            position: None,
            title: Some(tree.goal.title.clone()),
            completed: false,
            text_color: color::text_color_for(color::PRIMARY_CENTER).to_string(),
            color: color::PRIMARY_CENTER.to_string(),
        },
        Cell::SubGoalMirror(position) => sub_goal_cell(subs, row, col, position, "subGoalMirror"),
        Cell::SubGoalCenter(position) => sub_goal_cell(subs, row, col, position, "subGoal"),
        Cell::Action(sub_position, action_position) => {
            action_cell(subs, row, col, sub_position, action_position)
        }
    }
}

fn sub_goal_cell(
    subs: &[Option<&SubGoalTree>; 8],
    row: u8,
    col: u8,
    position: u8,
    kind: &str,
) -> GridCellView {
    let (id, title, fill) = match subs[(position - 1) as usize] {
        Some(st) => (
            Some(st.sub_goal.id.clone()),
            Some(st.sub_goal.title.clone()),
            color::base_color(position).to_string(),
        ),
        None => (None, None, color::EMPTY_CELL.to_string()),
    };
    GridCellView {
        row,
        col,
        kind: kind.to_string(),
        id,
        position: Some(position),
        title,
        completed: false,
        text_color: color::text_color_for(&fill).to_string(),
        color: fill,
    }
}

fn action_cell(
    subs: &[Option<&SubGoalTree>; 8],
    row: u8,
    col: u8,
    sub_position: u8,
    action_position: u8,
) -> GridCellView {
    let (id, title, completed, fill) = match subs[(sub_position - 1) as usize] {
        Some(st) => {
            let base = color::base_color(sub_position);
            match st
                .actions
                .iter()
                .find(|a| a.position == action_position as i64)
            {
                Some(action) => {
                    let done = action.completed == 1;
                    let fill = color::lighten(base, 0.55);
                    let fill = if done { color::darken(&fill, 0.15) } else { fill };
                    (Some(action.id.clone()), Some(action.title.clone()), done, fill)
                }
                None => (None, None, false, color::lighten(base, 0.85)),
            }
        }
        None => (None, None, false, color::EMPTY_CELL.to_string()),
    };
    GridCellView {
        row,
        col,
        kind: "action".to_string(),
        id,
        position: Some(action_position),
        title,
        completed,
        text_color: color::text_color_for(&fill).to_string(),
        color: fill,
    }
}
