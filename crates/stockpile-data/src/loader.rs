//! Catalogue loading: format detection, file discovery, key resolution.
//!
//! The catalogue lives in a single `catalogue.{ron,toml,json}` file. Loading
//! deserializes the schema structs, resolves item keys into engine ids in
//! declaration order, and finishes through the catalogue builder so every
//! structural check in core applies to file data too.

use crate::schema::{CatalogueData, CostData};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use stockpile_core::catalogue::{
    Catalogue, CatalogueBuilder, CatalogueError, CostEntry, DropRow, SubjectProfile, TrackProfile,
};
use stockpile_core::id::ItemId;

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during catalogue loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// The catalogue file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: &'static str, dir: PathBuf },

    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two catalogue files with different formats exist side by side.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error: {detail}")]
    Parse { detail: String },

    /// A key reference could not be resolved.
    #[error("unresolved {expected_kind} reference '{name}'")]
    UnresolvedRef {
        name: String,
        expected_kind: &'static str,
    },

    /// The resolved data failed catalogue validation.
    #[error(transparent)]
    Catalogue(#[from] CatalogueError),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection and file discovery
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

/// Scan a directory for a data file with the given base name (without
/// extension). Returns `Ok(None)` if no file is found, or
/// `Err(ConflictingFormats)` if multiple formats exist for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let extensions = ["ron", "toml", "json"];
    let mut found: Option<PathBuf> = None;

    for ext in &extensions {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(ref existing) = found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing.clone(),
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

// ===========================================================================
// Loading
// ===========================================================================

const CATALOGUE_BASE_NAME: &str = "catalogue";

/// Load and validate the catalogue from `dir/catalogue.{ron,toml,json}`.
pub fn load_catalogue(dir: &Path) -> Result<Catalogue, DataLoadError> {
    let path = find_data_file(dir, CATALOGUE_BASE_NAME)?.ok_or(DataLoadError::MissingRequired {
        file: CATALOGUE_BASE_NAME,
        dir: dir.to_path_buf(),
    })?;
    let format = detect_format(&path)?;
    let content = std::fs::read_to_string(&path)?;
    load_catalogue_str(&content, format)
}

/// Load and validate a catalogue from in-memory text.
pub fn load_catalogue_str(content: &str, format: Format) -> Result<Catalogue, DataLoadError> {
    let data: CatalogueData = match format {
        Format::Ron => ron::from_str(content).map_err(|e| DataLoadError::Parse {
            detail: e.to_string(),
        })?,
        Format::Json => serde_json::from_str(content).map_err(|e| DataLoadError::Parse {
            detail: e.to_string(),
        })?,
        Format::Toml => toml::from_str(content).map_err(|e| DataLoadError::Parse {
            detail: e.to_string(),
        })?,
    };
    resolve(data)
}

// ===========================================================================
// Key resolution
// ===========================================================================

fn resolve(data: CatalogueData) -> Result<Catalogue, DataLoadError> {
    let mut builder = CatalogueBuilder::new();

    // Items first; everything else references them by key.
    let mut items: HashMap<String, ItemId> = HashMap::new();
    for item in &data.items {
        let id = builder.register_item(&item.key, &item.name, item.value);
        // Duplicate keys are caught by the builder at build() time.
        items.entry(item.key.clone()).or_insert(id);
    }

    for formula in &data.formulas {
        let output = resolve_item(&items, &formula.output, "item")?;
        let costs = resolve_costs(&items, &formula.costs)?;
        builder.register_formula(
            &formula.key,
            output,
            formula.quantity,
            costs,
            formula.tags.clone(),
        );
    }

    for activity in &data.activities {
        let drops = activity
            .drops
            .iter()
            .map(|d| {
                Ok(DropRow {
                    item: resolve_item(&items, &d.item, "item")?,
                    observed: d.observed,
                    samples: d.samples,
                })
            })
            .collect::<Result<Vec<_>, DataLoadError>>()?;
        builder.register_activity(&activity.key, &activity.name, activity.ap_cost, drops);
    }

    for pool in &data.pools {
        let pool_item = resolve_item(&items, &pool.pool, "pool item")?;
        let denominations = pool
            .denominations
            .iter()
            .map(|(key, value)| Ok((resolve_item(&items, key, "denomination")?, *value)))
            .collect::<Result<Vec<_>, DataLoadError>>()?;
        builder.register_value_pool(pool_item, denominations);
    }

    for subject in &data.subjects {
        let tracks = subject
            .tracks
            .iter()
            .map(|t| {
                Ok((
                    t.key.clone(),
                    TrackProfile {
                        min_tier: t.min_tier.clone(),
                        step_costs: resolve_cost_tables(&items, &t.step_costs)?,
                    },
                ))
            })
            .collect::<Result<Vec<_>, DataLoadError>>()?;
        builder.register_subject(SubjectProfile {
            key: subject.key.clone(),
            name: subject.name.clone(),
            max_tier: subject.max_tier,
            level_caps: subject.level_caps.clone(),
            tier_costs: resolve_cost_tables(&items, &subject.tier_costs)?,
            level_costs: subject
                .level_costs
                .iter()
                .map(|table| resolve_cost_tables(&items, table))
                .collect::<Result<Vec<_>, DataLoadError>>()?,
            tracks,
        });
    }

    Ok(builder.build()?)
}

fn resolve_item(
    items: &HashMap<String, ItemId>,
    name: &str,
    expected_kind: &'static str,
) -> Result<ItemId, DataLoadError> {
    items
        .get(name)
        .copied()
        .ok_or_else(|| DataLoadError::UnresolvedRef {
            name: name.to_string(),
            expected_kind,
        })
}

fn resolve_costs(
    items: &HashMap<String, ItemId>,
    costs: &[CostData],
) -> Result<Vec<CostEntry>, DataLoadError> {
    costs
        .iter()
        .map(|c| {
            Ok(CostEntry::new(
                resolve_item(items, c.item(), "item")?,
                c.quantity(),
            ))
        })
        .collect()
}

fn resolve_cost_tables(
    items: &HashMap<String, ItemId>,
    tables: &[Vec<CostData>],
) -> Result<Vec<Vec<CostEntry>>, DataLoadError> {
    tables.iter().map(|row| resolve_costs(items, row)).collect()
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Create a temporary directory with a unique name for test isolation.
    fn make_test_dir(suffix: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "stockpile_data_test_{suffix}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn cleanup(dir: &Path) {
        let _ = fs::remove_dir_all(dir);
    }

    const SMALL_RON: &str = r#"
        (
            items: [
                (key: "shard", name: "Orirock Shard", value: Some(0.4)),
                (key: "cube", name: "Orirock Cube", value: Some(1.2)),
                (key: "exp", name: "Experience"),
                (key: "exp_small", name: "Small Cartridge"),
            ],
            formulas: [
                (key: "craft_cube", output: "cube", costs: [("shard", 3.0)], tags: ["workshop"]),
            ],
            activities: [
                (key: "stage_1_7", name: "1-7", ap_cost: 6.0, drops: [
                    (item: "shard", observed: 185.0, samples: Some(100.0)),
                ]),
            ],
            pools: [
                (pool: "exp", denominations: [("exp_small", 200.0)]),
            ],
        )
    "#;

    // -----------------------------------------------------------------------
    // detect_format
    // -----------------------------------------------------------------------

    #[test]
    fn detect_format_by_extension() {
        assert_eq!(detect_format(Path::new("catalogue.ron")).unwrap(), Format::Ron);
        assert_eq!(detect_format(Path::new("catalogue.toml")).unwrap(), Format::Toml);
        assert_eq!(detect_format(Path::new("catalogue.json")).unwrap(), Format::Json);
    }

    #[test]
    fn detect_format_unsupported() {
        assert!(matches!(
            detect_format(Path::new("catalogue.yaml")),
            Err(DataLoadError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            detect_format(Path::new("catalogue")),
            Err(DataLoadError::UnsupportedFormat { .. })
        ));
    }

    // -----------------------------------------------------------------------
    // find_data_file
    // -----------------------------------------------------------------------

    #[test]
    fn find_data_file_found() {
        let dir = make_test_dir("find_found");
        fs::write(dir.join("catalogue.ron"), "()").unwrap();

        let result = find_data_file(&dir, "catalogue").unwrap();
        assert_eq!(result, Some(dir.join("catalogue.ron")));

        cleanup(&dir);
    }

    #[test]
    fn find_data_file_missing() {
        let dir = make_test_dir("find_missing");
        assert_eq!(find_data_file(&dir, "catalogue").unwrap(), None);
        cleanup(&dir);
    }

    #[test]
    fn find_data_file_conflict() {
        let dir = make_test_dir("find_conflict");
        fs::write(dir.join("catalogue.ron"), "()").unwrap();
        fs::write(dir.join("catalogue.json"), "{}").unwrap();

        assert!(matches!(
            find_data_file(&dir, "catalogue"),
            Err(DataLoadError::ConflictingFormats { .. })
        ));

        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // load_catalogue_str
    // -----------------------------------------------------------------------

    #[test]
    fn load_small_catalogue_from_ron() {
        let cat = load_catalogue_str(SMALL_RON, Format::Ron).unwrap();
        assert_eq!(cat.item_count(), 4);
        assert_eq!(cat.formula_count(), 1);
        assert_eq!(cat.activity_count(), 1);

        let cube = cat.item_id("cube").unwrap();
        let formulas = cat.formulas_for(cube);
        assert_eq!(formulas.len(), 1);
        assert_eq!(cat.formula(formulas[0]).unwrap().tags, vec!["workshop"]);

        let exp = cat.item_id("exp").unwrap();
        assert!(cat.value_pool(exp).is_some());
    }

    #[test]
    fn load_catalogue_from_json() {
        let json = r#"{
            "items": [
                {"key": "shard", "name": "Orirock Shard", "value": 0.4},
                {"key": "cube", "name": "Orirock Cube"}
            ],
            "formulas": [
                {"key": "craft_cube", "output": "cube",
                 "costs": [{"item": "shard", "quantity": 3.0}]}
            ]
        }"#;
        let cat = load_catalogue_str(json, Format::Json).unwrap();
        assert_eq!(cat.item_count(), 2);
        let cube = cat.item_id("cube").unwrap();
        let f = cat.formula(cat.formulas_for(cube)[0]).unwrap();
        assert_eq!(f.costs[0].quantity, 3.0);
    }

    #[test]
    fn load_catalogue_from_toml() {
        let toml_str = r#"
            [[items]]
            key = "shard"
            name = "Orirock Shard"

            [[activities]]
            key = "stage_1_7"
            name = "1-7"
            ap_cost = 6.0

            [[activities.drops]]
            item = "shard"
            observed = 185.0
            samples = 100.0
        "#;
        let cat = load_catalogue_str(toml_str, Format::Toml).unwrap();
        assert_eq!(cat.activity_count(), 1);
        let stage = cat.activity(cat.activity_id("stage_1_7").unwrap()).unwrap();
        assert!((stage.drops[0].yield_per_run() - 1.85).abs() < 1e-12);
    }

    #[test]
    fn unresolved_item_reference_fails() {
        let ron = r#"
            (
                items: [(key: "cube", name: "Cube")],
                formulas: [(key: "bad", output: "cube", costs: [("missing", 1.0)])],
            )
        "#;
        let result = load_catalogue_str(ron, Format::Ron);
        assert!(matches!(
            result,
            Err(DataLoadError::UnresolvedRef { ref name, .. }) if name == "missing"
        ));
    }

    #[test]
    fn parse_error_reported() {
        let result = load_catalogue_str("this is not valid RON {{{", Format::Ron);
        assert!(matches!(result, Err(DataLoadError::Parse { .. })));
    }

    #[test]
    fn builder_validation_still_applies() {
        // Duplicate item keys pass resolution but fail catalogue validation.
        let ron = r#"
            (
                items: [
                    (key: "dup", name: "A"),
                    (key: "dup", name: "B"),
                ],
            )
        "#;
        let result = load_catalogue_str(ron, Format::Ron);
        assert!(matches!(
            result,
            Err(DataLoadError::Catalogue(CatalogueError::DuplicateKey { .. }))
        ));
    }

    // -----------------------------------------------------------------------
    // load_catalogue (from directory)
    // -----------------------------------------------------------------------

    #[test]
    fn load_catalogue_from_directory() {
        let dir = make_test_dir("load_dir");
        fs::write(dir.join("catalogue.ron"), SMALL_RON).unwrap();

        let cat = load_catalogue(&dir).unwrap();
        assert_eq!(cat.item_count(), 4);

        cleanup(&dir);
    }

    #[test]
    fn load_catalogue_missing_file() {
        let dir = make_test_dir("load_missing");
        let result = load_catalogue(&dir);
        assert!(matches!(result, Err(DataLoadError::MissingRequired { .. })));
        cleanup(&dir);
    }

    #[test]
    fn load_catalogue_with_subject() {
        let json = r#"{
            "items": [{"key": "gold", "name": "Gold"}],
            "subjects": [{
                "key": "amiya",
                "name": "Amiya",
                "max_tier": 1,
                "level_caps": [2, 2],
                "tier_costs": [[["gold", 100.0]]],
                "level_costs": [[[["gold", 5.0]]], [[["gold", 10.0]]]],
                "tracks": [
                    {"key": "skill_1", "min_tier": [0], "step_costs": [[["gold", 20.0]]]}
                ]
            }]
        }"#;
        let cat = load_catalogue_str(json, Format::Json).unwrap();
        let subject = cat.subject(cat.subject_id("amiya").unwrap()).unwrap();
        assert_eq!(subject.max_tier, 1);
        assert_eq!(subject.track("skill_1").unwrap().cap(), 1);
        let gold = cat.item_id("gold").unwrap();
        assert_eq!(subject.tier_costs[0][0].item, gold);
    }
}
