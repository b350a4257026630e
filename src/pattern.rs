use std::path::{Path, PathBuf};

use itertools::Itertools;
use log::info;
use thiserror::Error;

use crate::bitset::Bitset;
use crate::board::{Board, Position};
use crate::cell::{Cell, CellState, Color};
use crate::location::Location;

/// Errors raised while loading a captured-set pattern library.
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("failed to read pattern file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{origin}:{line}: {message}")]
    Parse {
        origin: String,
        line: usize,
        message: String,
    },
}

/// What a pattern constraint demands of a cell.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Require {
    Own,
    Opponent,
    Empty,
}

/// One captured-set record: constraints around a probed empty cell, plus
/// the cells the opponent is conceded if the probe is played.
///
/// Offsets are relative to the probe, written from Black's point of view
/// (connecting north to south). Offsets that land off the board resolve to
/// the edge cell of the axis that overflowed, so `own 0,1` on the last row
/// demands Black's south edge.
#[derive(Clone, Debug)]
struct CapturedPattern {
    constraints: Vec<(i8, i8, Require)>,
    captured: Vec<(i8, i8)>,
}

impl CapturedPattern {
    /// The same pattern in White's orientation: geometry transposed across
    /// the long diagonal. Requirements stay mover-relative.
    fn transposed(&self) -> CapturedPattern {
        CapturedPattern {
            constraints: self
                .constraints
                .iter()
                .map(|&(dx, dy, req)| (dy, dx, req))
                .collect(),
            captured: self.captured.iter().map(|&(dx, dy)| (dy, dx)).collect(),
        }
    }

    /// Match at the empty cell `probe`, returning the captured cells.
    fn matches(&self, position: &Position, probe: Cell, color: Color) -> Option<Bitset> {
        let board = position.board();
        let base = board.location(probe);
        for &(dx, dy, require) in &self.constraints {
            let cell = resolve(board, base, dx, dy)?;
            let ok = match require {
                Require::Own => position.state(cell) == CellState::from(color),
                Require::Opponent => position.state(cell) == CellState::from(color.other()),
                Require::Empty => position.is_empty(cell),
            };
            if !ok {
                return None;
            }
        }
        let mut captured = Bitset::EMPTY;
        for &(dx, dy) in &self.captured {
            let cell = resolve(board, base, dx, dy)?;
            if !position.is_empty(cell) {
                return None;
            }
            captured.set(cell);
        }
        Some(captured)
    }
}

/// Resolve an offset from `base`, mapping a single-axis overflow to the
/// corresponding edge cell. Overflow on both axes does not resolve.
fn resolve(board: &Board, base: Location, dx: i8, dy: i8) -> Option<Cell> {
    let x = base.0 as isize + dx as isize;
    let y = base.1 as isize + dy as isize;
    let x_out = x < 0 || x >= board.width() as isize;
    let y_out = y < 0 || y >= board.height() as isize;
    match (x_out, y_out) {
        (false, false) => Some(board.cell(Location(x as usize, y as usize))),
        (false, true) => Some(if y < 0 { Cell::NORTH } else { Cell::SOUTH }),
        (true, false) => Some(if x < 0 { Cell::WEST } else { Cell::EAST }),
        (true, true) => None,
    }
}

/// The captured-set pattern library, oriented once per color at load time.
#[derive(Clone, Default)]
pub struct PatternLibrary {
    oriented: [Vec<CapturedPattern>; 2],
}

impl PatternLibrary {
    /// A library with no patterns; every captured set comes out empty.
    pub fn empty() -> PatternLibrary {
        PatternLibrary::default()
    }

    /// The library shipped with the crate.
    pub fn builtin() -> Result<PatternLibrary, PatternError> {
        PatternLibrary::parse(
            include_str!("../patterns/vc-captured-set.txt"),
            "vc-captured-set.txt (builtin)",
        )
    }

    /// Load a library from a pattern file.
    pub fn load(path: impl AsRef<Path>) -> Result<PatternLibrary, PatternError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| PatternError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let library = PatternLibrary::parse(&text, &path.to_string_lossy())?;
        info!(
            "read {} captured set patterns from {}",
            library.len(),
            path.display()
        );
        Ok(library)
    }

    /// Parse pattern records from text. `origin` names the source in errors.
    pub fn parse(text: &str, origin: &str) -> Result<PatternLibrary, PatternError> {
        let err = |line: usize, message: &str| PatternError::Parse {
            origin: origin.to_string(),
            line,
            message: message.to_string(),
        };

        let mut black: Vec<CapturedPattern> = Vec::new();
        let mut current: Option<CapturedPattern> = None;
        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let mut words = trimmed.split_whitespace();
            let keyword = words.next().unwrap_or_default();
            match keyword {
                "pattern" => {
                    if current.is_some() {
                        return Err(err(line, "pattern block not closed with `end`"));
                    }
                    current = Some(CapturedPattern {
                        constraints: Vec::new(),
                        captured: Vec::new(),
                    });
                }
                "own" | "opponent" | "empty" | "captured" => {
                    let pattern = current
                        .as_mut()
                        .ok_or_else(|| err(line, "cell list outside a pattern block"))?;
                    for word in words {
                        let (dx, dy) = parse_offset(word)
                            .ok_or_else(|| err(line, "malformed offset, expected dx,dy"))?;
                        match keyword {
                            "own" => pattern.constraints.push((dx, dy, Require::Own)),
                            "opponent" => pattern.constraints.push((dx, dy, Require::Opponent)),
                            "empty" => pattern.constraints.push((dx, dy, Require::Empty)),
                            _ => pattern.captured.push((dx, dy)),
                        }
                    }
                }
                "end" => {
                    let pattern = current
                        .take()
                        .ok_or_else(|| err(line, "`end` outside a pattern block"))?;
                    if pattern.captured.is_empty() {
                        return Err(err(line, "pattern captures no cells"));
                    }
                    black.push(pattern);
                }
                _ => return Err(err(line, "unknown keyword")),
            }
        }
        if current.is_some() {
            return Err(err(text.lines().count(), "unterminated pattern block"));
        }

        let white = black.iter().map(CapturedPattern::transposed).collect();
        Ok(PatternLibrary {
            oriented: [black, white],
        })
    }

    pub fn len(&self) -> usize {
        self.oriented[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.oriented[0].is_empty()
    }

    /// First matching pattern at `probe` for `color`, if any.
    pub(crate) fn first_match(
        &self,
        position: &Position,
        probe: Cell,
        color: Color,
    ) -> Option<Bitset> {
        self.oriented[color.index()]
            .iter()
            .find_map(|pattern| pattern.matches(position, probe, color))
    }
}

fn parse_offset(word: &str) -> Option<(i8, i8)> {
    let (dx, dy) = word.split_once(',')?;
    Some((dx.parse().ok()?, dy.parse().ok()?))
}

/// Pattern-matching state over a position.
///
/// Callers hand one of these to the builder together with the groups view;
/// it must wrap the position the build is for.
pub struct PatternState<'a> {
    position: &'a Position,
}

impl<'a> PatternState<'a> {
    pub fn new(position: &'a Position) -> PatternState<'a> {
        PatternState { position }
    }

    pub fn position(&self) -> &'a Position {
        self.position
    }

    pub(crate) fn match_captured(
        &self,
        library: &PatternLibrary,
        probe: Cell,
        color: Color,
    ) -> Option<Bitset> {
        library.first_match(self.position, probe, color)
    }
}

/// A bridge template: two endpoints with exactly two common empty-capable
/// neighbors. Playing either carrier cell restores the connection through
/// the other, so the pair connects outright.
#[derive(Clone, Copy, Debug)]
pub(crate) struct VcPattern {
    pub(crate) x: Cell,
    pub(crate) y: Cell,
    pub(crate) carrier: Bitset,
}

impl VcPattern {
    pub(crate) fn is_edge_pattern(&self) -> bool {
        self.x.is_edge() || self.y.is_edge()
    }
}

/// Enumerate every bridge on the board for one color: pairs drawn from the
/// color's edges and the interior whose common interior neighborhood is
/// exactly two cells.
pub(crate) fn vc_patterns(board: &Board, color: Color) -> Vec<VcPattern> {
    let mut candidates = vec![color.edge1(), color.edge2()];
    candidates.extend(board.interior().iter());

    let mut patterns = Vec::new();
    for (&x, &y) in candidates.iter().tuple_combinations() {
        if board.nbs(x).test(y) {
            continue;
        }
        let common = board.nbs(x) & board.nbs(y) & board.interior();
        if common.count() == 2 {
            patterns.push(VcPattern { x, y, carrier: common });
        }
    }
    patterns
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_garbage() {
        assert!(PatternLibrary::parse("pattern\ncaptured 0;1\nend", "t").is_err());
        assert!(PatternLibrary::parse("own 0,1", "t").is_err());
        assert!(PatternLibrary::parse("pattern\nown 0,1", "t").is_err());
        assert!(PatternLibrary::parse("pattern\nend", "t").is_err());
    }

    #[test]
    fn builtin_parses() {
        let library = PatternLibrary::builtin().unwrap();
        assert!(!library.is_empty());
    }

    #[test]
    fn match_resolves_edges() {
        // own stone two below the probe, captured cell in between
        let text = "pattern\nown 0,2\nempty 0,1\ncaptured 0,1\nend\n";
        let library = PatternLibrary::parse(text, "t").unwrap();
        let board = Board::new(3, 3).unwrap();
        let position = Position::new(board);
        let b2 = position.board().cell_named("b2").unwrap();
        // (0,2) from b2 resolves to the south edge, which is Black's
        let hit = library.first_match(&position, b2, Color::Black);
        let b3 = position.board().cell_named("b3").unwrap();
        assert_eq!(hit, Some(Bitset::singleton(b3)));
        // for White the transposed pattern wants the east edge instead
        let hit = library.first_match(&position, b2, Color::White);
        let c2 = position.board().cell_named("c2").unwrap();
        assert_eq!(hit, Some(Bitset::singleton(c2)));
    }

    #[test]
    fn match_fails_on_occupied_capture() {
        let text = "pattern\nown 0,2\ncaptured 0,1\nend\n";
        let library = PatternLibrary::parse(text, "t").unwrap();
        let board = Board::new(3, 3).unwrap();
        let mut position = Position::new(board);
        let b3 = position.board().cell_named("b3").unwrap();
        position.place(b3, Color::White);
        let b2 = position.board().cell_named("b2").unwrap();
        assert_eq!(library.first_match(&position, b2, Color::Black), None);
    }

    #[test]
    fn bridges_include_edge_templates() {
        let board = Board::new(3, 3).unwrap();
        let patterns = vc_patterns(&board, Color::Black);
        let b2 = board.cell_named("b2").unwrap();
        let b1 = board.cell_named("b1").unwrap();
        let c1 = board.cell_named("c1").unwrap();
        let bridge = patterns
            .iter()
            .find(|p| (p.x, p.y) == (Cell::NORTH, b2) || (p.x, p.y) == (b2, Cell::NORTH))
            .expect("edge bridge");
        let expected: Bitset = [b1, c1].into_iter().collect();
        assert_eq!(bridge.carrier, expected);
        // no White edges in Black's pattern set
        assert!(patterns
            .iter()
            .all(|p| p.x != Cell::EAST && p.y != Cell::EAST));
    }

    #[test]
    fn interior_bridge_between_diagonal_cells() {
        let board = Board::new(3, 3).unwrap();
        let patterns = vc_patterns(&board, Color::Black);
        let a1 = board.cell_named("a1").unwrap();
        let b2 = board.cell_named("b2").unwrap();
        let bridge = patterns
            .iter()
            .find(|p| (p.x.min(p.y), p.x.max(p.y)) == (a1.min(b2), a1.max(b2)))
            .expect("interior bridge");
        let b1 = board.cell_named("b1").unwrap();
        let a2 = board.cell_named("a2").unwrap();
        let expected: Bitset = [b1, a2].into_iter().collect();
        assert_eq!(bridge.carrier, expected);
    }
}
