//! Recipe definitions and where they are read from
//!
//! One JSON file per good:
//! `{"itemid": ..., "recipe": {"A1": ..., ..., "C3": ..., "count": N}, "recipes": [...]}`.
//! Each non-empty slot is `"INGREDIENT:amount"` or a bare `"INGREDIENT"`.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::item_id::ItemId;

/// One 3x3 crafting grid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecipeGrid {
    #[serde(rename = "A1", default, skip_serializing_if = "Option::is_none")]
    pub a1: Option<String>,
    #[serde(rename = "A2", default, skip_serializing_if = "Option::is_none")]
    pub a2: Option<String>,
    #[serde(rename = "A3", default, skip_serializing_if = "Option::is_none")]
    pub a3: Option<String>,
    #[serde(rename = "B1", default, skip_serializing_if = "Option::is_none")]
    pub b1: Option<String>,
    #[serde(rename = "B2", default, skip_serializing_if = "Option::is_none")]
    pub b2: Option<String>,
    #[serde(rename = "B3", default, skip_serializing_if = "Option::is_none")]
    pub b3: Option<String>,
    #[serde(rename = "C1", default, skip_serializing_if = "Option::is_none")]
    pub c1: Option<String>,
    #[serde(rename = "C2", default, skip_serializing_if = "Option::is_none")]
    pub c2: Option<String>,
    #[serde(rename = "C3", default, skip_serializing_if = "Option::is_none")]
    pub c3: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
}

impl RecipeGrid {
    /// Build a grid from `(slot, content)` pairs, e.g. `[("A1", "X:2")]`.
    pub fn from_slots(slots: &[(&str, &str)], count: Option<i64>) -> Self {
        let mut grid = Self { count, ..Self::default() };
        for (slot, content) in slots {
            let cell = Some((*content).to_string());
            match *slot {
                "A1" => grid.a1 = cell,
                "A2" => grid.a2 = cell,
                "A3" => grid.a3 = cell,
                "B1" => grid.b1 = cell,
                "B2" => grid.b2 = cell,
                "B3" => grid.b3 = cell,
                "C1" => grid.c1 = cell,
                "C2" => grid.c2 = cell,
                "C3" => grid.c3 = cell,
                _ => {}
            }
        }
        grid
    }

    fn cells(&self) -> [(&'static str, Option<&str>); 9] {
        [
            ("A1", self.a1.as_deref()),
            ("A2", self.a2.as_deref()),
            ("A3", self.a3.as_deref()),
            ("B1", self.b1.as_deref()),
            ("B2", self.b2.as_deref()),
            ("B3", self.b3.as_deref()),
            ("C1", self.c1.as_deref()),
            ("C2", self.c2.as_deref()),
            ("C3", self.c3.as_deref()),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.cells()
            .iter()
            .all(|(_, cell)| cell.is_none_or(|c| c.trim().is_empty()))
    }

    /// Units produced per craft; missing or non-positive counts mean 1.
    pub fn yield_per_craft(&self) -> f64 {
        match self.count {
            Some(n) if n > 0 => n as f64,
            _ => 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecipeFile {
    #[serde(default)]
    pub itemid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe: Option<RecipeGrid>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recipes: Vec<RecipeGrid>,
}

impl RecipeFile {
    /// The preferred non-empty grid: the first one that yields 1 per craft,
    /// otherwise the first one. `recipes` entries come before `recipe`.
    pub fn preferred_grid(&self) -> Option<&RecipeGrid> {
        let candidates: Vec<&RecipeGrid> = self
            .recipes
            .iter()
            .chain(self.recipe.iter())
            .filter(|g| !g.is_empty())
            .collect();
        candidates
            .iter()
            .find(|g| g.yield_per_craft() == 1.0)
            .or_else(|| candidates.first())
            .copied()
    }

    /// Parse the preferred grid into a [`Recipe`].
    pub fn resolve(&self) -> RecipeLookup {
        match self.preferred_grid() {
            Some(grid) => {
                let recipe = Recipe::from_grid(grid);
                if recipe.ingredients.is_empty() {
                    RecipeLookup::Unusable("recipe yields no ingredients".to_string())
                } else {
                    RecipeLookup::Found(recipe)
                }
            }
            None => RecipeLookup::Unusable("no usable recipe content".to_string()),
        }
    }
}

/// A parsed recipe: per-craft ingredient amounts and yield.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    pub yield_per_craft: f64,
    pub ingredients: BTreeMap<ItemId, f64>,
    /// Slots that could not be read cleanly.
    pub notes: Vec<String>,
}

impl Recipe {
    pub fn from_grid(grid: &RecipeGrid) -> Self {
        let mut ingredients = BTreeMap::new();
        let mut notes = Vec::new();
        for (slot, cell) in grid.cells() {
            let Some(cell) = cell else { continue };
            match parse_cell(cell) {
                Cell::Empty => {}
                Cell::Ingredient { item, amount, note } => {
                    if let Some(note) = note {
                        notes.push(format!("{}: {}", slot, note));
                    }
                    *ingredients.entry(item).or_insert(0.0) += amount;
                }
            }
        }
        Self { yield_per_craft: grid.yield_per_craft(), ingredients, notes }
    }

    /// Number of crafts needed for `quantity` units.
    pub fn crafts_for(&self, quantity: f64) -> f64 {
        (quantity / self.yield_per_craft).ceil()
    }
}

enum Cell {
    Empty,
    Ingredient { item: ItemId, amount: f64, note: Option<String> },
}

fn parse_cell(raw: &str) -> Cell {
    let raw = raw.trim();
    if raw.is_empty() {
        return Cell::Empty;
    }
    let (id, amount) = match raw.split_once(':') {
        Some((id, amount)) => (id, Some(amount.trim())),
        None => (raw, None),
    };
    let item = ItemId::new(id);
    if item.is_empty() {
        return Cell::Empty;
    }
    match amount {
        None => Cell::Ingredient { item, amount: 1.0, note: None },
        Some(text) => match text.parse::<f64>() {
            Ok(n) if n.is_finite() && n > 0.0 => Cell::Ingredient { item, amount: n, note: None },
            _ => {
                let note = format!("invalid amount '{}' for {}, using 1", text, item);
                Cell::Ingredient { item, amount: 1.0, note: Some(note) }
            }
        },
    }
}

/// Result of looking up a good's recipe.
#[derive(Debug, Clone, PartialEq)]
pub enum RecipeLookup {
    Found(Recipe),
    /// No recipe defined for the good.
    Missing,
    /// A definition exists but cannot be used (unreadable, unparseable or empty).
    Unusable(String),
}

/// Anything recipes can be looked up in.
///
/// `Err` is reserved for a store that cannot be read at all; a good without a
/// recipe is [`RecipeLookup::Missing`].
pub trait RecipeSource: Send + Sync {
    fn lookup(&self, item: &ItemId) -> Result<RecipeLookup>;

    /// Every good with a recipe definition, sorted.
    fn list(&self) -> Result<Vec<ItemId>>;
}

/// Recipes stored as `<ITEM_ID>.json` files in one directory. Reads are
/// memoized for the lifetime of the value.
pub struct RecipeDir {
    root: PathBuf,
    cache: RwLock<HashMap<ItemId, RecipeLookup>>,
}

impl RecipeDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), cache: RwLock::new(HashMap::new()) }
    }

    /// Forget memoised lookups so edited recipe files are read again.
    pub fn clear(&self) {
        self.cache.write().clear();
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, item: &ItemId) -> PathBuf {
        self.root.join(format!("{}.json", item))
    }

    fn read(&self, item: &ItemId) -> Result<RecipeLookup> {
        let path = self.path_for(item);
        match fs::metadata(&path) {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(RecipeLookup::Missing),
            Err(source) => return Err(Error::RecipeStore { path, source }),
        }

        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "recipe file unreadable");
                return Ok(RecipeLookup::Unusable(format!("error reading recipe file: {}", e)));
            }
        };
        match serde_json::from_str::<RecipeFile>(&text) {
            Ok(file) => Ok(file.resolve()),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "recipe file unparseable");
                Ok(RecipeLookup::Unusable(format!("error parsing recipe JSON: {}", e)))
            }
        }
    }
}

impl RecipeSource for RecipeDir {
    fn lookup(&self, item: &ItemId) -> Result<RecipeLookup> {
        if let Some(hit) = self.cache.read().get(item) {
            return Ok(hit.clone());
        }
        let lookup = self.read(item)?;
        debug!(item = %item, found = matches!(lookup, RecipeLookup::Found(_)), "recipe lookup");
        self.cache.write().insert(item.clone(), lookup.clone());
        Ok(lookup)
    }

    fn list(&self) -> Result<Vec<ItemId>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut items = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| self.root.clone());
                Error::RecipeStore { path, source: e.into() }
            })?;
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                items.push(ItemId::new(stem));
            }
        }
        items.sort();
        items.dedup();
        Ok(items)
    }
}

/// Recipes held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecipes {
    files: HashMap<ItemId, RecipeFile>,
}

impl InMemoryRecipes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, item: ItemId, file: RecipeFile) {
        self.files.insert(item, file);
    }

    /// Add a single-grid recipe, e.g. `with_grid("C", &[("A1", "X:2")], None)`.
    pub fn with_grid(mut self, item: &str, slots: &[(&str, &str)], count: Option<i64>) -> Self {
        let id = ItemId::new(item);
        let file = RecipeFile {
            itemid: id.to_string(),
            recipe: Some(RecipeGrid::from_slots(slots, count)),
            ..RecipeFile::default()
        };
        self.files.insert(id, file);
        self
    }
}

impl RecipeSource for InMemoryRecipes {
    fn lookup(&self, item: &ItemId) -> Result<RecipeLookup> {
        Ok(self.files.get(item).map_or(RecipeLookup::Missing, RecipeFile::resolve))
    }

    fn list(&self) -> Result<Vec<ItemId>> {
        let mut items: Vec<_> = self.files.keys().cloned().collect();
        items.sort();
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn found(lookup: RecipeLookup) -> Recipe {
        match lookup {
            RecipeLookup::Found(r) => r,
            other => panic!("expected recipe, got {:?}", other),
        }
    }

    #[test]
    fn sums_amounts_per_ingredient() {
        let grid = RecipeGrid::from_slots(&[("A1", "x:2"), ("B1", "Y:3"), ("C1", "X")], None);
        let recipe = Recipe::from_grid(&grid);
        assert_eq!(recipe.ingredients[&ItemId::new("X")], 3.0);
        assert_eq!(recipe.ingredients[&ItemId::new("Y")], 3.0);
        assert_eq!(recipe.yield_per_craft, 1.0);
        assert!(recipe.notes.is_empty());
    }

    #[test]
    fn invalid_amount_defaults_to_one_with_note() {
        let grid = RecipeGrid::from_slots(&[("A1", "X:abc"), ("A2", "Y:-2")], None);
        let recipe = Recipe::from_grid(&grid);
        assert_eq!(recipe.ingredients[&ItemId::new("X")], 1.0);
        assert_eq!(recipe.ingredients[&ItemId::new("Y")], 1.0);
        assert_eq!(recipe.notes.len(), 2);
    }

    #[test]
    fn prefers_single_yield_variant() {
        let file: RecipeFile = serde_json::from_str(
            r#"{
                "itemid": "Z",
                "recipe": {"A1": "P:1", "count": 1},
                "recipes": [
                    {"A1": "Q:4", "count": 4},
                    {"A1": "", "count": 1},
                    {"A1": "R:2", "count": 0}
                ]
            }"#,
        )
        .unwrap();
        // count 0 means 1, and recipes are considered before recipe
        let recipe = found(file.resolve());
        assert_eq!(recipe.ingredients.keys().next().unwrap().as_str(), "R");
    }

    #[test]
    fn falls_back_to_first_grid() {
        let file = RecipeFile {
            recipes: vec![
                RecipeGrid::from_slots(&[("A1", "Q:4")], Some(4)),
                RecipeGrid::from_slots(&[("A1", "S:1")], Some(2)),
            ],
            ..RecipeFile::default()
        };
        let recipe = found(file.resolve());
        assert_eq!(recipe.yield_per_craft, 4.0);
        assert_eq!(recipe.crafts_for(9.0), 3.0);
    }

    #[test]
    fn empty_grids_are_unusable() {
        let file = RecipeFile { recipe: Some(RecipeGrid::default()), ..RecipeFile::default() };
        assert!(matches!(file.resolve(), RecipeLookup::Unusable(_)));
    }

    #[test]
    fn clear_rereads_edited_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("WIDGET.json");
        fs::write(&path, r#"{"recipe": {"A1": "GEAR:2"}}"#).unwrap();
        let recipes = RecipeDir::new(dir.path());
        let widget = ItemId::new("WIDGET");
        let gear = ItemId::new("GEAR");

        assert_eq!(found(recipes.lookup(&widget).unwrap()).ingredients[&gear], 2.0);
        fs::write(&path, r#"{"recipe": {"A1": "GEAR:5"}}"#).unwrap();
        assert_eq!(found(recipes.lookup(&widget).unwrap()).ingredients[&gear], 2.0);

        recipes.clear();
        assert_eq!(found(recipes.lookup(&widget).unwrap()).ingredients[&gear], 5.0);
    }

    #[test]
    fn directory_lookup_and_listing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("WIDGET.json"), r#"{"recipe": {"A1": "GEAR:2"}}"#).unwrap();
        fs::write(dir.path().join("BROKEN.json"), "{ not json").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let recipes = RecipeDir::new(dir.path());
        assert!(matches!(recipes.lookup(&ItemId::new("widget")).unwrap(), RecipeLookup::Found(_)));
        assert!(matches!(recipes.lookup(&ItemId::new("BROKEN")).unwrap(), RecipeLookup::Unusable(_)));
        assert_eq!(recipes.lookup(&ItemId::new("NOPE")).unwrap(), RecipeLookup::Missing);

        let listed: Vec<String> = recipes.list().unwrap().iter().map(|i| i.to_string()).collect();
        assert_eq!(listed, vec!["BROKEN", "WIDGET"]);
    }
}
