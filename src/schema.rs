//! Field-path schemas for record extraction
//!
//! Vendors lay out records differently: GeoLite2 nests the country code
//! under `country.iso_code`, lighter datasets use a flat `country_iso_code`.
//! A [`RecordSchema`] lists, per result field, the candidate paths to try in
//! order. Paths are dotted; a numeric segment indexes into an array
//! (`subdivisions.0.names.en`).
//!
//! A schema also names the `database_type` values it trusts. A database whose
//! metadata does not match is rejected at load time instead of silently
//! producing empty lookups.

use crate::config::DatabaseKind;
use crate::data_section::DataValue;
use crate::error::{DecodeError, Result};
use crate::mmdb::Metadata;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Result field names used as schema keys
pub mod fields {
    /// ISO 3166-1 alpha-2 country code
    pub const COUNTRY_CODE: &str = "country_code";
    /// English country name
    pub const COUNTRY_NAME: &str = "country_name";
    /// Two-letter continent code
    pub const CONTINENT: &str = "continent";
    /// Autonomous system number
    pub const ASN: &str = "asn";
    /// Autonomous system organization
    pub const ASN_ORG: &str = "asn_org";
    /// City name
    pub const CITY: &str = "city";
    /// First-level subdivision name
    pub const REGION: &str = "region";
    /// Postal code
    pub const POSTAL_CODE: &str = "postal_code";
    /// Latitude in degrees
    pub const LATITUDE: &str = "latitude";
    /// Longitude in degrees
    pub const LONGITUDE: &str = "longitude";
    /// IANA time zone name
    pub const TIMEZONE: &str = "timezone";
    /// Registrant organization
    pub const REGISTRANT_ORG: &str = "registrant_org";
    /// Registrant network range or handle
    pub const REGISTRANT_NET: &str = "registrant_net";
}

/// Candidate field paths and accepted database types for one database kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RecordSchema {
    /// Case-insensitive substrings of `database_type` this schema trusts.
    /// Empty accepts any database.
    pub database_types: Vec<String>,
    /// Result field name to ordered candidate paths
    pub fields: BTreeMap<String, Vec<String>>,
}

/// Partial schema from configuration, merged over the defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SchemaOverride {
    /// Replaces the accepted database types when present (`[]` accepts any)
    pub database_types: Option<Vec<String>>,
    /// Replaces the candidate paths of the listed fields
    pub fields: BTreeMap<String, Vec<String>>,
}

fn paths(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn field(name: &str, candidates: &[&str]) -> (String, Vec<String>) {
    (name.to_string(), paths(candidates))
}

impl RecordSchema {
    /// Built-in schema for a database kind
    pub fn for_kind(kind: DatabaseKind) -> Self {
        use fields::*;

        let (database_types, entries) = match kind {
            DatabaseKind::Country => (
                paths(&["country", "city"]),
                vec![
                    field(
                        COUNTRY_CODE,
                        &[
                            "country.iso_code",
                            "country_iso_code",
                            "iso_code",
                            "registered_country.iso_code",
                        ],
                    ),
                    field(COUNTRY_NAME, &["country.names.en", "country_name"]),
                    field(CONTINENT, &["continent.code", "continent_code"]),
                ],
            ),
            DatabaseKind::Asn => (
                paths(&["asn"]),
                vec![
                    field(ASN, &["autonomous_system_number", "asn"]),
                    field(
                        ASN_ORG,
                        &["autonomous_system_organization", "asn_organization"],
                    ),
                ],
            ),
            DatabaseKind::City => (
                paths(&["city"]),
                vec![
                    field(CITY, &["city.names.en", "city_name"]),
                    field(REGION, &["subdivisions.0.names.en", "region"]),
                    field(POSTAL_CODE, &["postal.code", "postal_code"]),
                    field(LATITUDE, &["location.latitude", "latitude"]),
                    field(LONGITUDE, &["location.longitude", "longitude"]),
                    field(TIMEZONE, &["location.time_zone", "time_zone", "timezone"]),
                ],
            ),
            DatabaseKind::Whois => (
                Vec::new(),
                vec![
                    field(
                        REGISTRANT_ORG,
                        &[
                            "registrant.organization",
                            "organization",
                            "org",
                            "registrant_org",
                        ],
                    ),
                    field(
                        REGISTRANT_NET,
                        &[
                            "registrant.network",
                            "network",
                            "netname",
                            "registrant_net",
                            "range",
                        ],
                    ),
                ],
            ),
        };

        RecordSchema {
            database_types,
            fields: entries.into_iter().collect(),
        }
    }

    /// Apply a configuration override on top of this schema
    pub fn merged(mut self, overrides: &SchemaOverride) -> Self {
        if let Some(types) = &overrides.database_types {
            self.database_types = types.clone();
        }
        for (field, candidates) in &overrides.fields {
            self.fields.insert(field.clone(), candidates.clone());
        }
        self
    }

    /// Whether a database with this `database_type` is trusted
    pub fn accepts(&self, database_type: &str) -> bool {
        if self.database_types.is_empty() {
            return true;
        }
        let database_type = database_type.to_ascii_lowercase();
        self.database_types
            .iter()
            .any(|t| database_type.contains(&t.to_ascii_lowercase()))
    }

    /// Reject a database whose metadata this schema does not trust
    pub fn check(&self, metadata: &Metadata) -> Result<()> {
        if self.accepts(&metadata.database_type) {
            Ok(())
        } else {
            Err(DecodeError::SchemaMismatch(format!(
                "database_type '{}' is not one of {:?}",
                metadata.database_type, self.database_types
            )))
        }
    }

    /// Candidate paths for a field (empty when unknown)
    pub fn paths(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First candidate path that resolves to a value accepted by `convert`
    pub fn find<'a, T>(
        &self,
        record: &'a DataValue,
        field: &str,
        convert: impl Fn(&'a DataValue) -> Option<T>,
    ) -> Option<T> {
        self.paths(field)
            .iter()
            .filter_map(|path| record.get_path(path.split('.')))
            .find_map(convert)
    }

    /// First candidate path holding a non-empty string
    pub fn find_str<'a>(&self, record: &'a DataValue, field: &str) -> Option<&'a str> {
        self.find(record, field, |v| v.as_str().filter(|s| !s.is_empty()))
    }

    /// First candidate path holding an unsigned integer
    pub fn find_u64(&self, record: &DataValue, field: &str) -> Option<u64> {
        self.find(record, field, DataValue::as_u64)
    }

    /// First candidate path holding a floating point number
    pub fn find_f64(&self, record: &DataValue, field: &str) -> Option<f64> {
        self.find(record, field, DataValue::as_f64)
    }
}
