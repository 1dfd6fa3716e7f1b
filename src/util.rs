use std::fmt::{self, Display};

/// Side length of the cross-shaped board.
pub const BOARD_SIZE: i8 = 14;
/// Squares on the full grid, corner voids included.
pub const GRID_SQUARES: usize = (BOARD_SIZE as usize) * (BOARD_SIZE as usize);

/// Hard ceiling on search depth, in plies.
pub const MAX_PLY: usize = 128;

/// A square on the 14x14 grid. Rows grow downward (Red sits on high rows,
/// Yellow on low rows); columns grow rightward (Blue low, Green high).
/// Corner-void squares are representable but rejected by
/// [`Loc::is_legal`]; board code never stores pieces there.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct Loc {
    row: i8,
    col: i8,
}

impl Loc {
    pub const fn new(row: i8, col: i8) -> Self {
        Self { row, col }
    }

    pub const fn row(self) -> i8 {
        self.row
    }

    pub const fn col(self) -> i8 {
        self.col
    }

    /// Flat index into `GRID_SQUARES`-sized tables.
    pub const fn index(self) -> usize {
        self.row as usize * BOARD_SIZE as usize + self.col as usize
    }

    /// True for squares that exist on the cross board: inside the grid and
    /// outside the four 3x3 corner voids.
    pub const fn is_legal(self) -> bool {
        let (r, c) = (self.row, self.col);
        if r < 0 || r >= BOARD_SIZE || c < 0 || c >= BOARD_SIZE {
            return false;
        }
        let corner_row = r < 3 || r > 10;
        let corner_col = c < 3 || c > 10;
        !(corner_row && corner_col)
    }

    /// The square `(row + dr, col + dc)`, if it exists on the board.
    pub const fn offset(self, dr: i8, dc: i8) -> Option<Self> {
        let loc = Self::new(self.row + dr, self.col + dc);
        if loc.is_legal() {
            Some(loc)
        } else {
            None
        }
    }

    pub fn all_legal() -> impl Iterator<Item = Self> {
        (0..BOARD_SIZE).flat_map(|row| {
            (0..BOARD_SIZE)
                .map(move |col| Self::new(row, col))
                .filter(|loc| loc.is_legal())
        })
    }
}

impl Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // files a..n left to right, ranks 1..14 bottom to top
        let file = (b'a' + self.col as u8) as char;
        let rank = BOARD_SIZE - self.row;
        write!(f, "{file}{rank}")
    }
}
