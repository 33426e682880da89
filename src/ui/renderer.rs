/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// How it works:
///   1. Sample the world around the camera into the `front` buffer
///   2. Compare each cell with the `back` buffer (previous frame)
///   3. Only emit terminal commands for cells that changed
///   4. Batch everything with `queue!`, flush once, swap front/back
///
/// The world is only read. One terminal cell covers `CELL_PX_X` by
/// `CELL_PX_Y` world pixels; an entity paints every cell its rect touches.

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::domain::entity::{AnimState, ChestState, Facing};
use crate::domain::geom::Rect;
use crate::sim::world::{Phase, WorldState};

/// World pixels per terminal column / row. A 60px block is 3×2 cells.
pub const CELL_PX_X: i32 = 20;
pub const CELL_PX_Y: i32 = 30;

const HUD_ROW: usize = 0;
const MAP_ROW: usize = 2;
/// HUD + gap + message + help.
const RESERVED_ROWS: usize = MAP_ROW + 2;

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct Cell {
    ch: char,
    fg: Color,
    bg: Color,
}

impl Cell {
    /// Explicit dark background so the gap between rows matches the cells.
    const BASE_BG: Color = Color::Rgb { r: 22, g: 22, b: 35 };

    const BLANK: Cell = Cell { ch: ' ', fg: Color::White, bg: Cell::BASE_BG };

    /// Differs from every real cell, so the next flush repaints everything.
    const INVALID: Cell = Cell { ch: '?', fg: Color::Magenta, bg: Color::Magenta };

    const fn glyph(ch: char, fg: Color) -> Cell {
        Cell { ch, fg, bg: Cell::BASE_BG }
    }
}

const BLOCK: Cell = Cell { ch: '#', fg: Color::Rgb { r: 150, g: 105, b: 60 }, bg: Color::Rgb { r: 70, g: 45, b: 25 } };
const ENEMY: Cell = Cell::glyph('e', Color::Red);
const ENEMY_IDLE: Cell = Cell::glyph('e', Color::DarkRed);
const BULLET: Cell = Cell::glyph('-', Color::Yellow);

// ── FrameBuffer: a 2D grid of Cells ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer { width: w, height: h, cells: vec![Cell::BLANK; w * h] }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Cell::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    fn get(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Cell::BLANK
        }
    }

    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color) {
        for (i, ch) in s.chars().enumerate() {
            if x + i >= self.width { break; }
            self.set(x + i, y, Cell::glyph(ch, fg));
        }
    }
}

// ── Camera ──

/// Top-left corner and size of the visible world area, in pixels.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Camera {
    pub x: i32,
    pub y: i32,
    pub view_w: i32,
    pub view_h: i32,
}

impl Camera {
    /// Center on `target`, clamped to the level so no void is shown past its edges.
    pub fn follow(target: &Rect, view_w: i32, view_h: i32, level_w: i32, level_h: i32) -> Camera {
        Camera {
            x: clamp_axis(target.x + target.w / 2 - view_w / 2, view_w, level_w),
            y: clamp_axis(target.y + target.h / 2 - view_h / 2, view_h, level_h),
            view_w,
            view_h,
        }
    }

    /// Cell span `[first, last)` covered by a world rect, clipped to the view.
    fn cells_of(&self, r: &Rect, cols: usize, rows: usize) -> Option<(usize, usize, usize, usize)> {
        let x0 = (r.x - self.x).div_euclid(CELL_PX_X).max(0);
        let x1 = (r.right() - self.x + CELL_PX_X - 1).div_euclid(CELL_PX_X).min(cols as i32);
        let y0 = (r.y - self.y).div_euclid(CELL_PX_Y).max(0);
        let y1 = (r.bottom() - self.y + CELL_PX_Y - 1).div_euclid(CELL_PX_Y).min(rows as i32);
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some((x0 as usize, x1 as usize, y0 as usize, y1 as usize))
    }
}

fn clamp_axis(pos: i32, view: i32, level: i32) -> i32 {
    if level <= view { 0 } else { pos.clamp(0, level - view) }
}

// ── Renderer ──

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    last_phase: Option<Phase>,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            last_phase: None,
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            SetBackgroundColor(Cell::BASE_BG),
            Clear(ClearType::All)
        )?;
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        self.resize(tw as usize, th as usize);
        Ok(())
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        execute!(self.writer, ResetColor, cursor::Show, terminal::LeaveAlternateScreen)?;
        terminal::disable_raw_mode()
    }

    fn resize(&mut self, w: usize, h: usize) {
        self.term_w = w;
        self.term_h = h;
        self.front.resize(w, h);
        self.back.resize(w, h);
        self.back.cells.fill(Cell::INVALID);
    }

    /// Draw one frame. `kills` is the running total shown in the HUD.
    pub fn render(&mut self, world: &WorldState, kills: u32) -> io::Result<()> {
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if tw as usize != self.term_w || th as usize != self.term_h {
            self.resize(tw as usize, th as usize);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
        }
        if self.last_phase != Some(world.phase) {
            self.back.cells.fill(Cell::INVALID);
            self.last_phase = Some(world.phase);
        }

        self.front.clear();
        compose_frame(&mut self.front, world, kills);
        self.flush_diff()?;
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(())
    }

    // ── Diff flush: only write changed cells ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = Cell::BASE_BG;
        let mut cursor_at: Option<(usize, usize)> = None;

        queue!(self.writer, SetForegroundColor(last_fg), SetBackgroundColor(last_bg))?;

        for y in 0..self.front.height {
            for x in 0..self.front.width {
                let cell = self.front.get(x, y);
                if cell == self.back.get(x, y) {
                    continue;
                }
                if cursor_at != Some((x, y)) {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                }
                if cell.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(cell.fg))?;
                    last_fg = cell.fg;
                }
                if cell.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(cell.bg))?;
                    last_bg = cell.bg;
                }
                queue!(self.writer, Print(cell.ch))?;
                cursor_at = Some((x + 1, y));
            }
        }

        self.writer.flush()
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

// ── Compose: build front buffer content ──

fn compose_frame(buf: &mut FrameBuffer, w: &WorldState, kills: u32) {
    let p = &w.player;
    let hud = format!(
        " PIRATE RUN  {}  x:{:<5} tick:{:<6} kills:{}",
        w.layout.name, p.rect.x, w.tick, kills,
    );
    buf.put_str(0, HUD_ROW, &hud, Color::Cyan);

    let map_rows = buf.height.saturating_sub(RESERVED_ROWS).max(1);
    compose_map(buf, w, MAP_ROW, map_rows);

    let (msg, color) = match w.phase {
        Phase::Playing if p.frozen => ("Opening the chest...", Color::Yellow),
        Phase::Playing => ("", Color::White),
        Phase::Won => ("Treasure found! R to play again", Color::Green),
        Phase::Dead => ("You were caught. R to try again", Color::Red),
    };
    buf.put_str(1, MAP_ROW + map_rows, msg, color);
    buf.put_str(
        1,
        MAP_ROW + map_rows + 1,
        "arrows/WASD move  space/W jump  J/enter shoot  R restart  Q quit",
        Color::DarkGrey,
    );
}

/// Paint the world into rows `top .. top + rows`, camera on the player.
fn compose_map(buf: &mut FrameBuffer, w: &WorldState, top: usize, rows: usize) {
    let cols = buf.width;
    let (level_w, level_h) = w.level_size();
    let cam = Camera::follow(
        &w.player.rect,
        cols as i32 * CELL_PX_X,
        rows as i32 * CELL_PX_Y,
        level_w,
        level_h,
    );

    let paint = |buf: &mut FrameBuffer, r: &Rect, cell: Cell| {
        if let Some((x0, x1, y0, y1)) = cam.cells_of(r, cols, rows) {
            for y in y0..y1 {
                for x in x0..x1 {
                    buf.set(x, top + y, cell);
                }
            }
        }
    };

    for block in w.layout.blocks() {
        paint(buf, block, BLOCK);
    }
    for chest in &w.chests {
        let ch = match chest.state {
            ChestState::Closed => '$',
            // Opening shows the sprite index counting up.
            ChestState::Opening => {
                char::from_digit(chest.sprite(w.physics.chest_sprite_count) as u32 % 10, 10)
                    .unwrap_or('%')
            }
            ChestState::Opened => '*',
        };
        paint(buf, &chest.rect, Cell::glyph(ch, Color::Yellow));
    }
    // Enemies outside the chunk window are frozen; draw them dimmed.
    for enemy in &w.enemies {
        paint(buf, &enemy.rect, ENEMY_IDLE);
    }
    for enemy in w.active_enemies() {
        paint(buf, &enemy.rect, ENEMY);
    }
    for bullet in &w.player.bullets {
        paint(buf, &bullet.rect, BULLET);
    }

    let p = &w.player;
    let ch = match p.sprite(w.physics.player_frame_count) {
        _ if !p.alive => 'x',
        (AnimState::Jump, _, _) => '^',
        (AnimState::Attack, Facing::Left, _) => '<',
        (AnimState::Attack, Facing::Right, _) => '>',
        (AnimState::Run, _, frame) if frame % 2 == 1 => '&',
        _ => '@',
    };
    paint(buf, &p.rect, Cell::glyph(ch, Color::White));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::PhysicsConfig;
    use crate::sim::level::LevelDef;

    fn world(rows: &[&str]) -> WorldState {
        let cfg = PhysicsConfig::default();
        let layout = Arc::new(LevelDef::from_rows("t", rows).build(&cfg));
        WorldState::new(layout, cfg)
    }

    #[test]
    fn camera_clamps_to_level_edges() {
        let player = Rect::new(120, 60, 40, 60);
        let cam = Camera::follow(&player, 800, 300, 6000, 360);
        assert_eq!((cam.x, cam.y), (0, 0));

        let far = Rect::new(5900, 60, 40, 60);
        let cam = Camera::follow(&far, 800, 300, 6000, 360);
        assert_eq!(cam.x, 5200);

        let mid = Rect::new(3000, 60, 40, 60);
        let cam = Camera::follow(&mid, 800, 300, 6000, 360);
        assert_eq!(cam.x, 3020 - 400);
    }

    #[test]
    fn level_smaller_than_view_pins_to_origin() {
        let player = Rect::new(100, 50, 40, 60);
        let cam = Camera::follow(&player, 2000, 900, 600, 180);
        assert_eq!((cam.x, cam.y), (0, 0));
    }

    #[test]
    fn rect_to_cells() {
        let cam = Camera { x: 0, y: 0, view_w: 800, view_h: 300 };
        // A block spans 3 columns and 2 rows.
        assert_eq!(cam.cells_of(&Rect::new(60, 120, 60, 60), 40, 10), Some((3, 6, 4, 6)));
        // Partially visible rect is clipped.
        assert_eq!(cam.cells_of(&Rect::new(-30, 0, 40, 30), 40, 10), Some((0, 1, 0, 1)));
        assert_eq!(cam.cells_of(&Rect::new(900, 0, 40, 30), 40, 10), None);
    }

    #[test]
    fn map_shows_blocks_player_and_chest() {
        let w = world(&["", "", "   C", "BBBBBB"]);
        let mut buf = FrameBuffer::new(40, 10);
        compose_map(&mut buf, &w, 0, 8);

        // Level 360×240 fits the 800×240 view: camera at the origin.
        // Floor row 3 starts at y=180, which is map row 6.
        assert_eq!(buf.get(0, 6), BLOCK);
        assert_eq!(buf.get(17, 7), BLOCK);
        assert_eq!(buf.get(18, 6), Cell::BLANK);
        // Player spawns at (120, 50): columns 6-7, rows 1-3.
        assert_eq!(buf.get(6, 2).ch, '@');
        // Chest at (180, 140) in cells 9-11, rows 4-5.
        assert_eq!(buf.get(9, 5).ch, '$');
    }

    #[test]
    fn frame_has_hud_and_help() {
        let w = world(&["", "", "BBBB"]);
        let mut buf = FrameBuffer::new(80, 12);
        compose_frame(&mut buf, &w, 3);
        let hud: String = (0..buf.width).map(|x| buf.get(x, HUD_ROW).ch).collect();
        assert!(hud.contains("PIRATE RUN"));
        assert!(hud.contains("kills:3"));
        let help: String = (0..buf.width).map(|x| buf.get(x, 11).ch).collect();
        assert!(help.contains("Q quit"));
    }
}
