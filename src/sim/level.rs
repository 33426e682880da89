/// Grid world builder.
///
/// ## Sources
///   1. A level file named on the command line or in `config.toml`
///   2. Built-in embedded levels (used when no file is configured)
///
/// ## Format
///   Plain text, one grid row per line, one cell per character.
///   Rows may differ in length; a short row simply has fewer cells.
///
/// ## Legend (see `domain::cell`):
///   'B' = Block     'E' = Enemy spawn     'C' = Chest spawn
///   anything else = empty space
///
/// ## Chunks
///   Column `c` belongs to chunk `c / columns_per_chunk`, which equals
///   `floor(x / chunk_width_px)` for the cell's pixel x. Inside a chunk,
///   blocks keep grid order (rows top-to-bottom, columns left-to-right).
///
/// The built `LevelLayout` is immutable and is shared between worlds
/// (one per episode) through an `Arc`.

use std::path::Path;

use crate::config::PhysicsConfig;
use crate::domain::cell::Cell;
use crate::domain::geom::Rect;
use crate::error::{Error, Result};

/// Raw level text, split into rows.
#[derive(Clone, Debug)]
pub struct LevelDef {
    pub name: String,
    pub rows: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnemySpawn {
    pub x: i32,
    pub y: i32,
    pub chunk: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChestSpawn {
    pub rect: Rect,
    pub chunk: i32,
}

/// Static geometry and spawn points of one level.
#[derive(Clone, Debug)]
pub struct LevelLayout {
    pub name: String,
    /// Blocks per chunk. Index = chunk number.
    pub chunks: Vec<Vec<Rect>>,
    pub enemy_spawns: Vec<EnemySpawn>,
    pub chest_spawns: Vec<ChestSpawn>,
    /// Longest row × block size (at least one block).
    pub width_px: i32,
    /// Row count × block size (at least one block).
    pub height_px: i32,
}

// ══════════════════════════════════════════════════════════════
// Public API
// ══════════════════════════════════════════════════════════════

impl LevelDef {
    /// Split level text into rows. Line terminators are not cells.
    pub fn from_text(name: &str, text: &str) -> Self {
        let rows = text
            .lines()
            .map(|l| l.trim_end_matches('\r').to_string())
            .collect();
        LevelDef { name: name.to_string(), rows }
    }

    /// Read a level file. An unreadable file is fatal for the caller.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::LevelRead {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        Ok(Self::from_text(&name, &text))
    }

    pub fn from_rows(name: &str, rows: &[&str]) -> Self {
        LevelDef {
            name: name.to_string(),
            rows: rows.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Build the static layout. Never fails: an empty grid yields a level
    /// with no blocks.
    pub fn build(&self, cfg: &PhysicsConfig) -> LevelLayout {
        build_layout(&self.name, &self.rows, cfg)
    }
}

/// Convenience: read + build.
pub fn load_layout(path: &Path, cfg: &PhysicsConfig) -> Result<LevelLayout> {
    Ok(LevelDef::from_file(path)?.build(cfg))
}

impl LevelLayout {
    pub fn block_count(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Rect> {
        self.chunks.iter().flatten()
    }
}

// ══════════════════════════════════════════════════════════════
// Builder
// ══════════════════════════════════════════════════════════════

fn build_layout(name: &str, rows: &[String], cfg: &PhysicsConfig) -> LevelLayout {
    let bs = cfg.block_size;
    let per_chunk = cfg.chunk_columns() as usize;

    let max_cols = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0);
    let chunk_count = max_cols.div_ceil(per_chunk).max(1);

    let mut chunks: Vec<Vec<Rect>> = vec![Vec::new(); chunk_count];
    let mut enemy_spawns = Vec::new();
    let mut chest_spawns = Vec::new();

    for (row, line) in rows.iter().enumerate() {
        let y = row as i32 * bs;
        for (col, ch) in line.chars().enumerate() {
            let x = col as i32 * bs;
            let chunk = col / per_chunk;
            match Cell::from_char(ch) {
                Cell::Block => chunks[chunk].push(Rect::new(x, y, bs, bs)),
                Cell::EnemySpawn => enemy_spawns.push(EnemySpawn { x, y, chunk: chunk as i32 }),
                Cell::ChestSpawn => chest_spawns.push(ChestSpawn {
                    // Baseline-aligned with the cell floor
                    rect: Rect::new(x, y + bs - cfg.chest_height, cfg.chest_width, cfg.chest_height),
                    chunk: chunk as i32,
                }),
                Cell::Empty => {}
            }
        }
    }

    let layout = LevelLayout {
        name: name.to_string(),
        chunks,
        enemy_spawns,
        chest_spawns,
        width_px: max_cols.max(1) as i32 * bs,
        height_px: rows.len().max(1) as i32 * bs,
    };
    log::info!(
        "built level {:?}: {} blocks in {} chunks, {} enemies, {} chests",
        layout.name,
        layout.block_count(),
        layout.chunks.len(),
        layout.enemy_spawns.len(),
        layout.chest_spawns.len(),
    );
    layout
}

// ══════════════════════════════════════════════════════════════
// Embedded fallback levels
// ══════════════════════════════════════════════════════════════

/// Names of the built-in levels, in difficulty order.
pub fn embedded_names() -> Vec<&'static str> {
    EMBEDDED.iter().map(|(name, _)| *name).collect()
}

/// A built-in level by name.
pub fn embedded_level(name: &str) -> Option<LevelDef> {
    EMBEDDED
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(n, rows)| LevelDef::from_rows(n, rows))
}

const EMBEDDED: &[(&str, &[&str])] = &[
    ("tutorial", &[
        "                                        ",
        "                                        ",
        "                                        ",
        "                                        ",
        "                                        ",
        "                         E          C   ",
        "BBBBBBBBBBBBBBBB   BBBBBBBBBBBBBBBBBBBBB",
        "BBBBBBBBBBBBBBBB   BBBBBBBBBBBBBBBBBBBBB",
    ]),
    ("hills", &[
        "                                                            ",
        "                                                            ",
        "                                                            ",
        "                               BBB                          ",
        "                  E        E  BBBBB        E             C  ",
        "            BBBBBBBBB   BBBBBBBBBBBBB   BBBBBBB    BBBBBBBBB",
        "BBBBBBBBBBBBBBBBBBBBB   BBBBBBBBBBBBB   BBBBBBBBBBBBBBBBBBBB",
        "BBBBBBBBBBBBBBBBBBBBB   BBBBBBBBBBBBB   BBBBBBBBBBBBBBBBBBBB",
    ]),
];

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════
