//! IP Geolocation module using MaxMind GeoLite2 database
//!
//! Resolves client addresses to the [`Location`] record the detectors
//! consume, for deployments where the edge network does not supply one.
//! Users must download the GeoLite2-City database separately from
//! MaxMind (free with registration).

use maxminddb::{geoip2, Reader};
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::models::Location;

/// Errors that can occur during geolocation lookups
#[derive(Error, Debug)]
pub enum GeoError {
    #[error("Failed to open database: {0}")]
    DatabaseOpen(#[from] maxminddb::MaxMindDBError),

    #[error("IP address not found in database")]
    NotFound,

    #[error("Location data missing for IP address")]
    NoLocation,

    #[error("Database file not found: {0}")]
    FileNotFound(String),
}

/// GeoIP lookup service using the MaxMind GeoLite2-City database
pub struct GeoIpService {
    reader: Arc<Reader<Vec<u8>>>,
}

impl GeoIpService {
    /// Open a MaxMind database file.
    ///
    /// Returns an error if the file is missing or cannot be parsed.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, GeoError> {
        let path = db_path.as_ref();
        if !path.exists() {
            return Err(GeoError::FileNotFound(path.display().to_string()));
        }

        let reader = Reader::open_readfile(path)?;
        Ok(GeoIpService {
            reader: Arc::new(reader),
        })
    }

    /// Resolve an IP address to a full location record.
    ///
    /// Country and city fall back to "Unknown" and the timezone to
    /// "UTC" when the database has coordinates but no names, matching
    /// what an edge-resolved record would carry.
    pub fn lookup(&self, ip: &IpAddr) -> Result<Location, GeoError> {
        let city: geoip2::City = self.reader.lookup(*ip).map_err(|e| match e {
            maxminddb::MaxMindDBError::AddressNotFoundError(_) => GeoError::NotFound,
            other => GeoError::DatabaseOpen(other),
        })?;

        let location = city.location.as_ref().ok_or(GeoError::NoLocation)?;
        let latitude = location.latitude.ok_or(GeoError::NoLocation)?;
        let longitude = location.longitude.ok_or(GeoError::NoLocation)?;

        Ok(Location {
            country: city
                .country
                .as_ref()
                .and_then(|c| c.iso_code)
                .unwrap_or("Unknown")
                .to_string(),
            city: city
                .city
                .as_ref()
                .and_then(|c| c.names.as_ref())
                .and_then(|n| n.get("en").copied())
                .unwrap_or("Unknown")
                .to_string(),
            latitude,
            longitude,
            timezone: location.time_zone.unwrap_or("UTC").to_string(),
        })
    }

    /// Look up an IP address, returning None instead of an error.
    ///
    /// Useful when an unresolvable address should simply produce an
    /// attempt without a location.
    pub fn lookup_optional(&self, ip: &IpAddr) -> Option<Location> {
        self.lookup(ip).ok()
    }

    /// Check if an IP address is in the database.
    pub fn contains(&self, ip: &IpAddr) -> bool {
        self.lookup(ip).is_ok()
    }
}

impl Clone for GeoIpService {
    fn clone(&self) -> Self {
        GeoIpService {
            reader: Arc::clone(&self.reader),
        }
    }
}
