//! Pure reshaping steps shared by the stages: chunk planning, chunk merging,
//! ACS cleaning and boundary normalization.

use crate::adapters::shapes::ShapeRecord;
use crate::config::IdentifierConfig;
use crate::domain::layer::{Feature, Field, Layer, Value};
use crate::domain::model::{StatRow, StatTable, ZipCode};
use crate::domain::table::RawTable;
use crate::utils::error::{EtlError, Result};
use regex::Regex;
use std::collections::HashSet;

/// ACS variable codes such as `B01001_001E` or `B25077_001MA`.
pub const VARIABLE_CODE_PATTERN: &str = r"^[A-Z][0-9A-Z]+_[0-9]{3}[A-Z]{1,2}$";

/// Splits `variables` into request-sized groups, order preserved.
pub fn chunk_variables(variables: &[String], max_per_request: usize) -> Vec<Vec<String>> {
    variables
        .chunks(max_per_request.max(1))
        .map(<[String]>::to_vec)
        .collect()
}

/// Folds the per-chunk tables into one. Each step merges on the first
/// identifier alias both sides carry, or lines the columns up by row
/// position when they share none.
pub fn merge_chunks(tables: Vec<RawTable>, aliases: &[String]) -> Result<RawTable> {
    let mut tables = tables.into_iter();
    let Some(mut merged) = tables.next() else {
        return Err(EtlError::NoChunksFetched { attempted: 0 });
    };

    for table in tables {
        let key = aliases
            .iter()
            .find(|alias| merged.column_index(alias).is_some() && table.column_index(alias).is_some());
        merged = match key {
            Some(key) => merged.merge_outer(table, key)?,
            None => {
                tracing::warn!("Chunks share no identifier column, concatenating side by side");
                merged.concat_columns(table)
            }
        };
    }
    Ok(merged)
}

/// Turns the merged API response into one numeric row per zipcode. A column
/// is kept when it was `requested` or looks like an ACS variable code.
pub fn clean_statistics(
    mut table: RawTable,
    ids: &IdentifierConfig,
    requested: &[String],
) -> Result<StatTable> {
    let id_column = table
        .find_column(&ids.statistic_aliases)
        .ok_or_else(|| EtlError::IdentifierColumnNotFound {
            source_name: "Census API response".to_string(),
            candidates: ids.statistic_aliases.clone(),
        })?
        .to_string();

    let geography: Vec<String> = table
        .headers
        .iter()
        .filter(|h| {
            *h != &id_column
                && ids
                    .dropped_geography
                    .iter()
                    .any(|g| g.eq_ignore_ascii_case(h))
        })
        .cloned()
        .collect();
    table.drop_columns(&geography.iter().map(String::as_str).collect::<Vec<_>>());

    let pattern = Regex::new(VARIABLE_CODE_PATTERN).map_err(|e| EtlError::ProcessingError {
        message: e.to_string(),
    })?;
    let mut variable_indices = Vec::new();
    for (index, header) in table.headers.iter().enumerate() {
        if header == &id_column {
            continue;
        }
        if requested.contains(header) || pattern.is_match(header) {
            variable_indices.push(index);
        } else {
            tracing::debug!("Dropping non-variable column '{}'", header);
        }
    }
    let missing: Vec<&str> = requested
        .iter()
        .filter(|code| table.column_index(code).is_none())
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        tracing::warn!(
            "⚠️ {} requested variables missing from the response: {}",
            missing.len(),
            missing.join(", ")
        );
    }
    let id_index = table.column_index(&id_column).ok_or_else(|| EtlError::ProcessingError {
        message: format!("identifier column '{}' vanished during cleaning", id_column),
    })?;

    let mut stats = StatTable::new(
        variable_indices
            .iter()
            .map(|&i| table.headers[i].clone())
            .collect(),
    );
    let mut seen = HashSet::new();
    let mut invalid = 0usize;
    for row in &table.rows {
        let Some(zipcode) = row[id_index].as_deref().and_then(ZipCode::canonicalize) else {
            invalid += 1;
            continue;
        };
        if !seen.insert(zipcode.clone()) {
            continue;
        }
        let values = variable_indices
            .iter()
            .map(|&i| row[i].as_deref().and_then(parse_number))
            .collect();
        stats.rows.push(StatRow { zipcode, values });
    }

    if invalid > 0 {
        tracing::warn!("Dropped {} rows without a valid zipcode", invalid);
    }
    tracing::debug!(
        "Cleaned statistics: {} zipcodes x {} variables",
        stats.len(),
        stats.variables.len()
    );
    Ok(stats)
}

fn parse_number(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Builds the `zipcodes` layer from raw shapefile records: resolves the
/// identifier column, canonicalizes it, drops duplicates (first wins) and
/// sorts by zipcode.
pub fn normalize_boundaries(
    records: Vec<ShapeRecord>,
    ids: &IdentifierConfig,
    layer_name: &str,
) -> Result<Layer> {
    let Some(first) = records.first() else {
        tracing::warn!("No boundary records inside the region");
        return Ok(Layer::features(layer_name, vec![Field::text(&ids.canonical)]));
    };

    let id_column = ids
        .boundary_aliases
        .iter()
        .find(|alias| first.attributes.contains_key(*alias))
        .cloned()
        .ok_or_else(|| EtlError::IdentifierColumnNotFound {
            source_name: "boundary shapefile".to_string(),
            candidates: ids.boundary_aliases.clone(),
        })?;
    tracing::debug!("Using '{}' as the boundary identifier", id_column);

    let metadata: Vec<&String> = ids
        .boundary_metadata
        .iter()
        .filter(|name| first.attributes.contains_key(*name))
        .collect();

    let mut fields = vec![Field::text(&ids.canonical)];
    fields.extend(metadata.iter().map(|name| Field::text(name.as_str())));

    let mut seen = HashSet::new();
    let mut invalid = 0usize;
    let mut rows: Vec<(ZipCode, Feature)> = Vec::with_capacity(records.len());
    for record in records {
        let zipcode = record
            .attributes
            .get(&id_column)
            .and_then(|v| v.as_deref())
            .and_then(ZipCode::canonicalize);
        let Some(zipcode) = zipcode else {
            invalid += 1;
            continue;
        };
        if !seen.insert(zipcode.clone()) {
            continue;
        }

        let mut values = vec![Value::Text(zipcode.to_string())];
        values.extend(
            metadata
                .iter()
                .map(|name| Value::from(record.attributes.get(*name).cloned().flatten())),
        );
        rows.push((
            zipcode,
            Feature {
                geometry: Some(record.geometry),
                values,
            },
        ));
    }
    if invalid > 0 {
        tracing::warn!("⚠️ Skipped {} boundaries with an invalid '{}'", invalid, id_column);
    }

    rows.sort_by(|a, b| a.0.cmp(&b.0));
    let mut layer = Layer::features(layer_name, fields);
    for (_, feature) in rows {
        layer.push(feature)?;
    }
    Ok(layer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::geometry::Geometry;
    use std::collections::BTreeMap;

    fn codes(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("B01001_{:03}E", i)).collect()
    }

    fn raw(headers: &[&str], rows: &[&[Option<&str>]]) -> RawTable {
        let mut table = RawTable::new(headers.iter().map(|h| h.to_string()).collect());
        for row in rows {
            table
                .rows
                .push(row.iter().map(|c| c.map(str::to_string)).collect());
        }
        table
    }

    fn record(attrs: &[(&str, &str)], x: f64) -> ShapeRecord {
        ShapeRecord {
            geometry: Geometry::point(x, 39.0),
            attributes: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), Some(v.to_string())))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn test_chunking_covers_input() {
        for (n, c) in [(0, 50), (1, 50), (50, 50), (51, 50), (120, 50), (7, 3)] {
            let vars = codes(n);
            let chunks = chunk_variables(&vars, c);
            assert_eq!(chunks.len(), n.div_ceil(c), "n={n} c={c}");
            assert!(chunks.iter().all(|chunk| chunk.len() <= c));
            assert_eq!(chunks.concat(), vars);
        }
    }

    #[test]
    fn test_merge_chunks_on_shared_alias() {
        let aliases = IdentifierConfig::default().statistic_aliases;
        let a = raw(
            &["B01001_001E", "state", "zip code tabulation area"],
            &[&[Some("100"), Some("29"), Some("64101")]],
        );
        let b = raw(
            &["B19013_001E", "state", "zip code tabulation area"],
            &[&[Some("5"), Some("29"), Some("64101")]],
        );
        let merged = merge_chunks(vec![a, b], &aliases).unwrap();
        assert_eq!(
            merged.headers,
            vec!["B01001_001E", "state", "zip code tabulation area", "B19013_001E"]
        );
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn test_merge_chunks_without_shared_alias_concatenates() {
        let aliases = IdentifierConfig::default().statistic_aliases;
        let a = raw(&["B01001_001E", "ZCTA5"], &[&[Some("1"), Some("64101")]]);
        let b = raw(&["B19013_001E"], &[&[Some("2")]]);
        let merged = merge_chunks(vec![a, b], &aliases).unwrap();
        assert_eq!(merged.headers, vec!["B01001_001E", "ZCTA5", "B19013_001E"]);
        assert_eq!(merged.rows[0][2].as_deref(), Some("2"));
    }

    #[test]
    fn test_clean_statistics() {
        let table = raw(
            &["NAME", "B01001_001E", "B19013_001E", "GEO_ID", "state", "zip code tabulation area"],
            &[
                &[Some("ZCTA5 64101"), Some("1200"), Some("-"), Some("x"), Some("29"), Some("64101")],
                &[Some("ZCTA5 501"), Some("15"), Some("40000"), Some("x"), Some("36"), Some("501")],
                &[Some("dup"), Some("9"), Some("9"), Some("x"), Some("29"), Some("64101")],
                &[Some("bad"), Some("1"), Some("1"), Some("x"), Some("29"), Some("64A01")],
                &[Some("none"), Some("1"), Some("1"), Some("x"), Some("29"), None],
            ],
        );
        let stats = clean_statistics(table, &IdentifierConfig::default(), &[]).unwrap();

        assert_eq!(stats.variables, vec!["B01001_001E", "B19013_001E"]);
        assert_eq!(stats.len(), 2);
        let z64101 = ZipCode::canonicalize("64101").unwrap();
        assert_eq!(stats.get(&z64101, "B01001_001E"), Some(1200.0));
        assert_eq!(stats.get(&z64101, "B19013_001E"), None);
        assert_eq!(stats.rows[1].zipcode.as_str(), "00501");
    }

    #[test]
    fn test_clean_statistics_requires_identifier() {
        let table = raw(&["B01001_001E"], &[&[Some("1")]]);
        let err = clean_statistics(table, &IdentifierConfig::default(), &[]).unwrap_err();
        assert!(matches!(err, EtlError::IdentifierColumnNotFound { .. }));
    }

    #[test]
    fn test_clean_statistics_keeps_requested_profile_codes() {
        let table = raw(
            &["DP05_0001E", "S1701_C01_001E", "NAME", "zip code tabulation area"],
            &[&[Some("5120"), Some("4980"), Some("ZCTA5 64101"), Some("64101")]],
        );
        let requested = vec![
            "DP05_0001E".to_string(),
            "S1701_C01_001E".to_string(),
            "DP02_0001E".to_string(),
        ];
        let stats = clean_statistics(table, &IdentifierConfig::default(), &requested).unwrap();

        assert_eq!(stats.variables, vec!["DP05_0001E", "S1701_C01_001E"]);
        let z64101 = ZipCode::canonicalize("64101").unwrap();
        assert_eq!(stats.get(&z64101, "DP05_0001E"), Some(5120.0));
        assert_eq!(stats.get(&z64101, "S1701_C01_001E"), Some(4980.0));
    }

    #[test]
    fn test_variable_code_pattern() {
        let pattern = Regex::new(VARIABLE_CODE_PATTERN).unwrap();
        for ok in ["B01001_001E", "B25077_001MA", "C17002_008M"] {
            assert!(pattern.is_match(ok), "{ok}");
        }
        for bad in ["NAME", "GEO_ID", "b01001_001E", "B01001_01E", "B01001_001"] {
            assert!(!pattern.is_match(bad), "{bad}");
        }
    }

    #[test]
    fn test_normalize_boundaries() {
        let records = vec![
            record(&[("ZCTA5CE20", "64102"), ("GEOID20", "64102")], -94.5),
            record(&[("ZCTA5CE20", "64101"), ("GEOID20", "64101")], -94.6),
            record(&[("ZCTA5CE20", "64102"), ("GEOID20", "dup")], -94.7),
            record(&[("ZCTA5CE20", "6410X"), ("GEOID20", "bad")], -94.8),
        ];
        let layer =
            normalize_boundaries(records, &IdentifierConfig::default(), "zipcodes").unwrap();

        assert_eq!(layer.field_names().collect::<Vec<_>>(), vec!["ZIPCODE", "GEOID20"]);
        let zips: Vec<&str> = layer
            .column("ZIPCODE")
            .unwrap()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(zips, vec!["64101", "64102"]);
        // first occurrence of 64102 kept
        assert_eq!(layer.features[1].values[1], Value::Text("64102".into()));
    }

    #[test]
    fn test_normalize_boundaries_uses_older_alias() {
        let records = vec![record(&[("ZCTA5CE10", "66002")], -94.9)];
        let layer =
            normalize_boundaries(records, &IdentifierConfig::default(), "zipcodes").unwrap();
        assert_eq!(layer.features[0].values[0], Value::Text("66002".into()));
    }

    #[test]
    fn test_normalize_boundaries_without_identifier() {
        let records = vec![record(&[("NAME", "x")], -94.9)];
        let err =
            normalize_boundaries(records, &IdentifierConfig::default(), "zipcodes").unwrap_err();
        assert!(matches!(err, EtlError::IdentifierColumnNotFound { .. }));
    }
}
