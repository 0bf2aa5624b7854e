//! Compiled-in region and ACS variable catalogs for the Kansas City metro.

use crate::domain::geometry::BoundingBox;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct County {
    pub name: String,
    pub fips: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRegion {
    pub name: String,
    pub fips: String,
    pub counties: Vec<County>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableCategory {
    pub key: String,
    pub name: String,
    pub variables: Vec<String>,
}

fn state(name: &str, fips: &str, counties: &[(&str, &str)]) -> StateRegion {
    StateRegion {
        name: name.to_string(),
        fips: fips.to_string(),
        counties: counties
            .iter()
            .map(|(name, fips)| County {
                name: name.to_string(),
                fips: fips.to_string(),
            })
            .collect(),
    }
}

pub fn kansas_city_counties() -> Vec<StateRegion> {
    vec![
        state(
            "Missouri",
            "29",
            &[("Cass", "037"), ("Clay", "047"), ("Jackson", "095"), ("Platte", "165")],
        ),
        state(
            "Kansas",
            "20",
            &[
                ("Johnson", "091"),
                ("Leavenworth", "103"),
                ("Wyandotte", "209"),
                ("Miami", "121"),
            ],
        ),
    ]
}

/// Rough rectangle around the eight counties. Not a county-boundary clip.
pub fn kansas_city_bbox() -> BoundingBox {
    BoundingBox::new(-95.5, 38.5, -94.0, 40.0)
}

fn category(key: &str, name: &str, variables: &[&str]) -> VariableCategory {
    VariableCategory {
        key: key.to_string(),
        name: name.to_string(),
        variables: variables.iter().map(|v| v.to_string()).collect(),
    }
}

pub fn acs_categories() -> Vec<VariableCategory> {
    vec![
        category(
            "demographics",
            "Core Demographics",
            &[
                "B01001_001E", // total population
                "B01001_002E", // male
                "B01001_026E", // female
                "B01002_001E", // median age
            ],
        ),
        category(
            "race_ethnicity",
            "Race and Ethnicity",
            &[
                "B02001_001E",
                "B02001_002E", // white alone
                "B02001_003E", // black or african american alone
                "B02001_004E", // american indian and alaska native alone
                "B02001_005E", // asian alone
                "B02001_006E", // native hawaiian and other pacific islander alone
                "B03003_001E",
                "B03003_002E", // not hispanic or latino
                "B03003_003E", // hispanic or latino
            ],
        ),
        category(
            "housing",
            "Housing",
            &[
                "B25001_001E", // housing units
                "B25002_001E",
                "B25002_002E", // occupied
                "B25002_003E", // vacant
                "B25003_001E",
                "B25003_002E", // owner-occupied
                "B25003_003E", // renter-occupied
                "B25077_001E", // median home value
                "B25064_001E", // median gross rent
            ],
        ),
        category(
            "income",
            "Income",
            &[
                "B19013_001E", // median household income
                "B19301_001E", // per capita income
            ],
        ),
        category(
            "education",
            "Education",
            &[
                "B15003_001E", // population 25 and over
                "B15003_022E", // bachelor's
                "B15003_023E", // master's
                "B15003_024E", // professional
                "B15003_025E", // doctorate
            ],
        ),
        category(
            "employment",
            "Employment",
            &[
                "B23025_001E", // population 16 and over
                "B23025_002E", // in labor force
                "B23025_003E", // civilian labor force
                "B23025_004E", // employed
                "B23025_005E", // unemployed
                "B23025_006E", // armed forces
            ],
        ),
        category(
            "commuting",
            "Commuting",
            &[
                "B08301_001E", // workers 16 and over
                "B08301_003E", // car, truck, or van: drove alone
                "B08301_010E", // public transportation
                "B08301_016E", // taxicab
                "B08301_017E", // motorcycle
                "B08301_018E", // bicycle
            ],
        ),
        category(
            "health_insurance",
            "Health Insurance",
            &["B27001_001E", "B27001_002E", "B27001_003E"],
        ),
        category("disability", "Disability", &["B18101_001E", "B18101_002E"]),
        category(
            "veteran",
            "Veteran Status",
            &[
                "B21001_001E", // population 18 and over
                "B21001_002E", // veteran
            ],
        ),
        category(
            "language",
            "Language",
            &["B16001_001E", "B16001_002E", "B16001_003E"],
        ),
    ]
}
