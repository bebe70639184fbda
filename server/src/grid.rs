//! Uniform-cell spatial index used for broad-phase queries.
//!
//! The world `[0, width] x [0, height]` is cut into square cells. An entity
//! is registered in every cell its bounding box touches, so a query only has
//! to visit the cells under the query shape's bounding box. Bounds outside the
//! world are clamped onto the border cells rather than dropped.
//!
//! The grid also remembers each entity's bounds as of its last update, and
//! query results are filtered against them: a query returns exactly the
//! entities whose bounding box overlaps the query's bounding box. Callers
//! still run the exact shape test themselves.

use shared::{EntityId, Hitbox, Rect};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CellRange {
    min_col: usize,
    min_row: usize,
    max_col: usize,
    max_row: usize,
}

impl CellRange {
    fn cells(self, columns: usize) -> impl Iterator<Item = usize> {
        (self.min_row..=self.max_row).flat_map(move |row| {
            (self.min_col..=self.max_col).map(move |col| row * columns + col)
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct GridEntry {
    bounds: Rect,
    range: CellRange,
}

#[derive(Debug)]
pub struct SpatialGrid {
    width: f32,
    height: f32,
    cell_size: f32,
    columns: usize,
    rows: usize,
    cells: Vec<Vec<EntityId>>,
    entries: HashMap<EntityId, GridEntry>,
}

impl SpatialGrid {
    pub fn new(width: f32, height: f32, cell_size: f32) -> Self {
        let cell_size = if cell_size > 0.0 { cell_size } else { 1.0 };
        let columns = ((width / cell_size).ceil() as usize).max(1);
        let rows = ((height / cell_size).ceil() as usize).max(1);

        Self {
            width,
            height,
            cell_size,
            columns,
            rows,
            cells: vec![Vec::new(); columns * rows],
            entries: HashMap::new(),
        }
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    fn cell_range(&self, bounds: &Rect) -> CellRange {
        let column = |x: f32| ((x / self.cell_size).floor().max(0.0) as usize).min(self.columns - 1);
        let row = |y: f32| ((y / self.cell_size).floor().max(0.0) as usize).min(self.rows - 1);

        CellRange {
            min_col: column(bounds.min.x),
            min_row: row(bounds.min.y),
            max_col: column(bounds.max.x),
            max_row: row(bounds.max.y),
        }
    }

    /// Registers `id` in every cell `bounds` overlaps. Re-inserting an id
    /// already present moves it to the new bounds.
    pub fn insert(&mut self, id: EntityId, bounds: Rect) {
        if self.entries.contains_key(&id) {
            self.update(id, bounds);
            return;
        }

        let range = self.cell_range(&bounds);
        for cell in range.cells(self.columns) {
            self.cells[cell].push(id);
        }
        self.entries.insert(id, GridEntry { bounds, range });
    }

    pub fn remove(&mut self, id: EntityId) -> bool {
        let Some(entry) = self.entries.remove(&id) else {
            return false;
        };

        for cell in entry.range.cells(self.columns) {
            let occupants = &mut self.cells[cell];
            if let Some(index) = occupants.iter().position(|&other| other == id) {
                occupants.swap_remove(index);
            }
        }
        true
    }

    /// Re-registers `id` under its current bounds.
    pub fn update(&mut self, id: EntityId, bounds: Rect) {
        let range = self.cell_range(&bounds);
        let current = self.entries.get(&id).map(|entry| entry.range);
        match current {
            // Same footprint: only the stored bounds change.
            Some(existing) if existing == range => {
                if let Some(entry) = self.entries.get_mut(&id) {
                    entry.bounds = bounds;
                }
            }
            Some(_) => {
                self.remove(id);
                self.insert(id, bounds);
            }
            None => self.insert(id, bounds),
        }
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn bounds_of(&self, id: EntityId) -> Option<Rect> {
        self.entries.get(&id).map(|entry| entry.bounds)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entities whose bounding box overlaps `area`, de-duplicated.
    pub fn query_rect(&self, area: &Rect) -> BTreeSet<EntityId> {
        let mut found = BTreeSet::new();
        for cell in self.cell_range(area).cells(self.columns) {
            for &id in &self.cells[cell] {
                if found.contains(&id) {
                    continue;
                }
                if let Some(entry) = self.entries.get(&id) {
                    if entry.bounds.overlaps(area) {
                        found.insert(id);
                    }
                }
            }
        }
        found
    }

    pub fn query(&self, shape: &Hitbox) -> BTreeSet<EntityId> {
        self.query_rect(&shape.bounds())
    }

    #[cfg(test)]
    fn occupancy(&self, id: EntityId) -> usize {
        self.cells.iter().filter(|cell| cell.contains(&id)).count()
    }
}
