use crate::domain::geometry::{BoundingBox, Geometry};
use crate::utils::error::{EtlError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Real,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
}

impl Field {
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Text,
        }
    }

    pub fn real(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Real,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Real(f64),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Text(s) => serde_json::Value::String(s.clone()),
            // NaN and infinities have no JSON form
            Value::Real(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
        }
    }
}

impl From<Option<f64>> for Value {
    fn from(value: Option<f64>) -> Self {
        value.map(Value::Real).unwrap_or(Value::Null)
    }
}

impl From<Option<String>> for Value {
    fn from(value: Option<String>) -> Self {
        value.map(Value::Text).unwrap_or(Value::Null)
    }
}

/// One row of a layer. `values` lines up with the layer's `fields`.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Option<Geometry>,
    pub values: Vec<Value>,
}

/// A named table inside the container. Feature layers carry a geometry
/// column, attribute layers do not.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub name: String,
    pub fields: Vec<Field>,
    pub has_geometry: bool,
    pub features: Vec<Feature>,
}

impl Layer {
    pub fn features(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            fields,
            has_geometry: true,
            features: Vec::new(),
        }
    }

    pub fn attributes(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            fields,
            has_geometry: false,
            features: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn push(&mut self, feature: Feature) -> Result<()> {
        if feature.values.len() != self.fields.len() {
            return Err(EtlError::ProcessingError {
                message: format!(
                    "layer '{}' has {} fields but feature has {} values",
                    self.name,
                    self.fields.len(),
                    feature.values.len()
                ),
            });
        }
        if feature.geometry.is_some() && !self.has_geometry {
            return Err(EtlError::ProcessingError {
                message: format!("attribute layer '{}' cannot hold geometry", self.name),
            });
        }
        self.features.push(feature);
        Ok(())
    }

    /// Value of `field` in every feature, in order.
    pub fn column(&self, field: &str) -> Option<impl Iterator<Item = &Value>> {
        let index = self.field_index(field)?;
        Some(self.features.iter().map(move |f| &f.values[index]))
    }

    /// Replaces the named field, or appends it if absent. `values` must have
    /// one entry per feature.
    pub fn set_column(&mut self, field: Field, values: Vec<Value>) -> Result<()> {
        if values.len() != self.features.len() {
            return Err(EtlError::ProcessingError {
                message: format!(
                    "column '{}' has {} values for {} features",
                    field.name,
                    values.len(),
                    self.features.len()
                ),
            });
        }
        match self.field_index(&field.name) {
            Some(index) => {
                self.fields[index] = field;
                for (feature, value) in self.features.iter_mut().zip(values) {
                    feature.values[index] = value;
                }
            }
            None => {
                self.fields.push(field);
                for (feature, value) in self.features.iter_mut().zip(values) {
                    feature.values.push(value);
                }
            }
        }
        Ok(())
    }

    /// Geometry type shared by every feature, `GEOMETRY` when mixed or empty.
    pub fn geometry_type_name(&self) -> &'static str {
        let mut names = self
            .features
            .iter()
            .filter_map(|f| f.geometry.as_ref())
            .map(Geometry::type_name);
        match names.next() {
            Some(first) if names.all(|name| name == first) => first,
            _ => "GEOMETRY",
        }
    }

    pub fn bounds(&self) -> Option<BoundingBox> {
        self.features
            .iter()
            .filter_map(|f| f.geometry.as_ref().and_then(Geometry::bbox))
            .reduce(|acc, bbox| acc.union(&bbox))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zip_layer() -> Layer {
        let mut layer = Layer::features("zipcodes", vec![Field::text("ZIPCODE")]);
        layer
            .push(Feature {
                geometry: Some(Geometry::point(-94.5, 39.0)),
                values: vec![Value::Text("64101".to_string())],
            })
            .unwrap();
        layer
            .push(Feature {
                geometry: Some(Geometry::point(-94.6, 39.2)),
                values: vec![Value::Text("64102".to_string())],
            })
            .unwrap();
        layer
    }

    #[test]
    fn test_push_rejects_misaligned_feature() {
        let mut layer = zip_layer();
        let result = layer.push(Feature {
            geometry: None,
            values: vec![],
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_attribute_layer_rejects_geometry() {
        let mut layer = Layer::attributes("acs_data_table", vec![Field::text("ZIPCODE")]);
        let result = layer.push(Feature {
            geometry: Some(Geometry::point(0.0, 0.0)),
            values: vec![Value::Text("64101".to_string())],
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_set_column_appends_then_replaces() {
        let mut layer = zip_layer();
        layer
            .set_column(
                Field::text("geometry_wkt"),
                vec![Value::Text("a".into()), Value::Null],
            )
            .unwrap();
        assert_eq!(layer.fields.len(), 2);

        layer
            .set_column(
                Field::text("geometry_wkt"),
                vec![Value::Text("b".into()), Value::Text("c".into())],
            )
            .unwrap();
        assert_eq!(layer.fields.len(), 2);
        let column: Vec<_> = layer.column("geometry_wkt").unwrap().cloned().collect();
        assert_eq!(column, vec![Value::Text("b".into()), Value::Text("c".into())]);
    }

    #[test]
    fn test_bounds_and_type() {
        let layer = zip_layer();
        assert_eq!(layer.geometry_type_name(), "POINT");
        let bounds = layer.bounds().unwrap();
        assert_eq!(bounds, BoundingBox::new(-94.6, 39.0, -94.5, 39.2));
    }

    #[test]
    fn test_value_to_json() {
        assert_eq!(Value::Real(f64::NAN).to_json(), serde_json::Value::Null);
        assert_eq!(Value::Real(1.5).to_json(), serde_json::json!(1.5));
        assert_eq!(Value::Text("x".into()).to_json(), serde_json::json!("x"));
    }
}
