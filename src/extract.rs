//! Typed record extractors
//!
//! Each extractor turns the decoded record for an IP into one typed struct.
//! Extraction is permissive: a missing or mistyped field means "no match",
//! since geo databases routinely omit optional data. The one hard failure is
//! a top-level record that is not a map at all, which means the database is
//! not the kind the caller thinks it is.

use crate::config::DatabaseKind;
use crate::countries;
use crate::data_section::DataValue;
use crate::error::{DecodeError, Result};
use crate::mmdb::Reader;
use crate::schema::{fields, RecordSchema};
use std::net::IpAddr;

/// A typed view over one kind of record
pub trait RecordExtractor: Sized {
    /// Database kind this extractor reads
    const KIND: DatabaseKind;

    /// Build the typed record from a decoded map, `None` if required fields are absent
    fn from_value(record: &DataValue, schema: &RecordSchema) -> Option<Self>;
}

/// Country code plus name and continent
#[derive(Debug, Clone, PartialEq)]
pub struct CountryRecord {
    /// ISO 3166-1 alpha-2 code as stored in the database
    pub code: String,
    /// English name from the record, else from the static table
    pub name: Option<String>,
    /// Continent code from the record, else from the static table
    pub continent: Option<String>,
}

impl RecordExtractor for CountryRecord {
    const KIND: DatabaseKind = DatabaseKind::Country;

    fn from_value(record: &DataValue, schema: &RecordSchema) -> Option<Self> {
        let code = schema.find_str(record, fields::COUNTRY_CODE)?;
        let name = schema
            .find_str(record, fields::COUNTRY_NAME)
            .or_else(|| countries::name(code));
        let continent = schema
            .find_str(record, fields::CONTINENT)
            .or_else(|| countries::continent(code));

        Some(CountryRecord {
            code: code.to_string(),
            name: name.map(str::to_string),
            continent: continent.map(str::to_string),
        })
    }
}

/// Autonomous system number and organization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsnRecord {
    /// Autonomous system number
    pub number: u32,
    /// Organization operating the AS
    pub organization: Option<String>,
}

impl RecordExtractor for AsnRecord {
    const KIND: DatabaseKind = DatabaseKind::Asn;

    fn from_value(record: &DataValue, schema: &RecordSchema) -> Option<Self> {
        let number = u32::try_from(schema.find_u64(record, fields::ASN)?).ok()?;
        Some(AsnRecord {
            number,
            organization: schema
                .find_str(record, fields::ASN_ORG)
                .map(str::to_string),
        })
    }
}

/// City-level location
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CityRecord {
    /// City name
    pub city: Option<String>,
    /// First subdivision (state, region)
    pub region: Option<String>,
    /// Postal code
    pub postal_code: Option<String>,
    /// Latitude in degrees
    pub latitude: Option<f64>,
    /// Longitude in degrees
    pub longitude: Option<f64>,
    /// IANA time zone
    pub timezone: Option<String>,
}

impl RecordExtractor for CityRecord {
    const KIND: DatabaseKind = DatabaseKind::City;

    fn from_value(record: &DataValue, schema: &RecordSchema) -> Option<Self> {
        let text = |field| schema.find_str(record, field).map(str::to_string);
        let city = CityRecord {
            city: text(fields::CITY),
            region: text(fields::REGION),
            postal_code: text(fields::POSTAL_CODE),
            latitude: schema.find_f64(record, fields::LATITUDE),
            longitude: schema.find_f64(record, fields::LONGITUDE),
            timezone: text(fields::TIMEZONE),
        };

        if city == CityRecord::default() {
            None
        } else {
            Some(city)
        }
    }
}

/// Registrant organization and network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhoisRecord {
    /// Registrant organization
    pub organization: Option<String>,
    /// Registered network range or handle
    pub network: Option<String>,
}

impl RecordExtractor for WhoisRecord {
    const KIND: DatabaseKind = DatabaseKind::Whois;

    fn from_value(record: &DataValue, schema: &RecordSchema) -> Option<Self> {
        let organization = schema
            .find_str(record, fields::REGISTRANT_ORG)
            .map(str::to_string);
        let network = schema
            .find_str(record, fields::REGISTRANT_NET)
            .map(str::to_string);

        if organization.is_none() && network.is_none() {
            return None;
        }
        Some(WhoisRecord {
            organization,
            network,
        })
    }
}

/// Look up `ip` in `reader` and extract a typed record
///
/// Returns `Ok(None)` when the IP is not covered or the record lacks the
/// required fields, and `SchemaMismatch` when the record is not a map.
pub fn extract<T: RecordExtractor>(
    reader: &Reader,
    ip: IpAddr,
    schema: &RecordSchema,
) -> Result<Option<T>> {
    let hit = match reader.lookup_pointer(ip)? {
        Some(hit) => hit,
        None => return Ok(None),
    };

    let record = reader.read_value(hit.data_offset)?;
    if record.as_map().is_none() {
        return Err(DecodeError::SchemaMismatch(format!(
            "{} record at offset {} is a {}, expected map",
            T::KIND,
            hit.data_offset,
            record.type_name()
        )));
    }

    Ok(T::from_value(&record, schema))
}
