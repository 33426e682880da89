//! Level grid legend.
//! The meaning of each character is decided here and nowhere else;
//! the level builder matches on the result.

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Cell {
    #[default]
    Empty,
    Block,      // 'B' solid ground
    EnemySpawn, // 'E'
    ChestSpawn, // 'C'
}

impl Cell {
    /// Any unrecognised character is empty space.
    pub fn from_char(ch: char) -> Self {
        match ch {
            'B' => Cell::Block,
            'E' => Cell::EnemySpawn,
            'C' => Cell::ChestSpawn,
            _ => Cell::Empty,
        }
    }
}
