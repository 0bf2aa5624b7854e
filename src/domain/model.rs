use crate::domain::layer::{Feature, Field, FieldKind, Layer, Value};
use crate::utils::error::{EtlError, Result};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Five-digit, zero-padded ZCTA identifier. The only way to build one is
/// [`ZipCode::canonicalize`], so both sides of every join agree on the form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZipCode(String);

impl ZipCode {
    pub const WIDTH: usize = 5;

    /// Accepts 1 to 5 ASCII digits (surrounding whitespace ignored) and
    /// left-pads with zeros.
    pub fn canonicalize(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty()
            || trimmed.len() > Self::WIDTH
            || !trimmed.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        Some(Self(format!("{:0>width$}", trimmed, width = Self::WIDTH)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ZipCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatRow {
    pub zipcode: ZipCode,
    pub values: Vec<Option<f64>>,
}

/// Cleaned ACS estimates: one row per zipcode, one column per variable code.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatTable {
    pub variables: Vec<String>,
    pub rows: Vec<StatRow>,
}

impl StatTable {
    pub fn new(variables: Vec<String>) -> Self {
        Self {
            variables,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn zipcodes(&self) -> impl Iterator<Item = &ZipCode> {
        self.rows.iter().map(|r| &r.zipcode)
    }

    pub fn get(&self, zipcode: &ZipCode, variable: &str) -> Option<f64> {
        let index = self.variables.iter().position(|v| v == variable)?;
        self.rows
            .iter()
            .find(|r| &r.zipcode == zipcode)
            .and_then(|r| r.values[index])
    }

    /// Keeps only rows whose zipcode is in `known`.
    pub fn retain_known(&mut self, known: &HashSet<ZipCode>) {
        self.rows.retain(|row| known.contains(&row.zipcode));
    }

    /// Geometry-free layer: the identifier column followed by every variable.
    pub fn to_attribute_layer(&self, name: &str, id_field: &str) -> Result<Layer> {
        let mut fields = vec![Field::text(id_field)];
        fields.extend(self.variables.iter().map(Field::real));

        let mut layer = Layer::attributes(name, fields);
        for row in &self.rows {
            let mut values = Vec::with_capacity(row.values.len() + 1);
            values.push(Value::Text(row.zipcode.to_string()));
            values.extend(row.values.iter().copied().map(Value::from));
            layer.push(Feature {
                geometry: None,
                values,
            })?;
        }
        Ok(layer)
    }

    /// Rebuilds a table from a stored attribute layer: every `Real` field is a
    /// variable, `id_field` is the identifier.
    pub fn from_layer(layer: &Layer, id_field: &str) -> Result<Self> {
        let id_index =
            layer
                .field_index(id_field)
                .ok_or_else(|| EtlError::IdentifierColumnNotFound {
                    source_name: format!("layer '{}'", layer.name),
                    candidates: vec![id_field.to_string()],
                })?;
        let variable_indices: Vec<usize> = layer
            .fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.kind == FieldKind::Real)
            .map(|(i, _)| i)
            .collect();

        let mut table = StatTable::new(
            variable_indices
                .iter()
                .map(|&i| layer.fields[i].name.clone())
                .collect(),
        );
        for feature in &layer.features {
            let Some(zipcode) = feature.values[id_index].as_str().and_then(ZipCode::canonicalize)
            else {
                continue;
            };
            let values = variable_indices
                .iter()
                .map(|&i| feature.values[i].as_f64())
                .collect();
            table.rows.push(StatRow { zipcode, values });
        }
        Ok(table)
    }

    /// Left join: every boundary feature survives, carrying its geometry and
    /// metadata, with the matching statistics appended (or nulls when there
    /// is no match).
    pub fn left_join(&self, boundaries: &Layer, id_field: &str, name: &str) -> Result<Layer> {
        let id_index =
            boundaries
                .field_index(id_field)
                .ok_or_else(|| EtlError::IdentifierColumnNotFound {
                    source_name: format!("layer '{}'", boundaries.name),
                    candidates: vec![id_field.to_string()],
                })?;

        // boundary columns win on name collisions
        let joined: Vec<(usize, &String)> = self
            .variables
            .iter()
            .enumerate()
            .filter(|(_, v)| boundaries.field_index(v).is_none())
            .collect();

        let mut fields = boundaries.fields.clone();
        fields.extend(joined.iter().map(|(_, v)| Field::real(v.as_str())));

        let by_zip: HashMap<&ZipCode, &StatRow> = self
            .rows
            .iter()
            .rev() // first occurrence wins
            .map(|row| (&row.zipcode, row))
            .collect();

        let mut layer = Layer::features(name, fields);
        for feature in &boundaries.features {
            let zipcode = feature.values[id_index]
                .as_str()
                .and_then(ZipCode::canonicalize);
            let row = zipcode.as_ref().and_then(|z| by_zip.get(z));

            let mut values = feature.values.clone();
            if let Some(zipcode) = &zipcode {
                values[id_index] = Value::Text(zipcode.to_string());
            }
            values.extend(
                joined
                    .iter()
                    .map(|(i, _)| Value::from(row.and_then(|r| r.values[*i]))),
            );
            layer.push(Feature {
                geometry: feature.geometry.clone(),
                values,
            })?;
        }
        Ok(layer)
    }
}

/// Canonical zipcodes present in a boundary layer.
pub fn zipcodes_in_layer(layer: &Layer, id_field: &str) -> Result<HashSet<ZipCode>> {
    let column = layer
        .column(id_field)
        .ok_or_else(|| EtlError::IdentifierColumnNotFound {
            source_name: format!("layer '{}'", layer.name),
            candidates: vec![id_field.to_string()],
        })?;
    Ok(column
        .filter_map(|v| v.as_str().and_then(ZipCode::canonicalize))
        .collect())
}
