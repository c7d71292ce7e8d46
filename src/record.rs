use serde::Serialize;

use crate::geocode::GeocodedPlace;
use crate::suburbs::{Coordinates, Remoteness, SuburbRecord};

/// The final record produced by both generation and lookup. Suburb-level
/// lookups leave the street fields empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddressRecord {
    pub street_number: Option<u32>,
    pub street_name: Option<String>,
    pub full_address: String,
    pub suburb: String,
    pub postcode: String,
    pub council: String,
    pub remoteness: Remoteness,
    pub socio_economic_index: u8,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl AddressRecord {
    /// a synthesized street address inside the given suburb
    pub fn from_street_and_suburb(
        street_number: u32,
        street_name: &str,
        suburb: &SuburbRecord,
        coordinates: Option<Coordinates>,
    ) -> Self {
        Self {
            full_address: format!(
                "{} {}, {} SA {}",
                street_number, street_name, suburb.name, suburb.postcode
            ),
            street_number: Some(street_number),
            street_name: Some(street_name.to_string()),
            suburb: suburb.name.clone(),
            postcode: suburb.postcode.clone(),
            council: suburb.council.clone(),
            remoteness: suburb.remoteness,
            socio_economic_index: suburb.socio_economic_index,
            latitude: coordinates.map(|c| round6(c.latitude)),
            longitude: coordinates.map(|c| round6(c.longitude)),
        }
    }

    /// a suburb-level result, as returned for name and postcode lookups
    pub fn from_suburb(suburb: &SuburbRecord, coordinates: Option<Coordinates>) -> Self {
        Self {
            street_number: None,
            street_name: None,
            full_address: format!("{}, SA {}, Australia", suburb.name, suburb.postcode),
            suburb: suburb.name.clone(),
            postcode: suburb.postcode.clone(),
            council: suburb.council.clone(),
            remoteness: suburb.remoteness,
            socio_economic_index: suburb.socio_economic_index,
            latitude: coordinates.map(|c| round6(c.latitude)),
            longitude: coordinates.map(|c| round6(c.longitude)),
        }
    }

    /// a geocoded street address enriched with the attributes of a
    /// reference suburb
    pub fn from_geocoded_street(place: &GeocodedPlace, suburb: &SuburbRecord) -> Self {
        // the leading segment of the place name is the street portion
        let street = place
            .place_name
            .split(',')
            .next()
            .unwrap_or(&place.place_name)
            .trim()
            .to_string();
        Self {
            street_number: None,
            street_name: Some(street),
            full_address: place.place_name.clone(),
            suburb: suburb.name.clone(),
            postcode: suburb.postcode.clone(),
            council: suburb.council.clone(),
            remoteness: suburb.remoteness,
            socio_economic_index: suburb.socio_economic_index,
            latitude: Some(round6(place.coordinates.latitude)),
            longitude: Some(round6(place.coordinates.longitude)),
        }
    }
}

impl std::fmt::Display for AddressRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Address: {}", self.full_address)?;
        match (&self.street_number, &self.street_name) {
            (Some(number), Some(name)) => writeln!(f, "Street: {} {}", number, name)?,
            (None, Some(name)) => writeln!(f, "Street: {}", name)?,
            _ => {}
        }
        writeln!(f, "Suburb: {}", self.suburb)?;
        writeln!(f, "Postcode: {}", self.postcode)?;
        writeln!(f, "Council: {}", self.council)?;
        if let (Some(lat), Some(lng)) = (self.latitude, self.longitude) {
            writeln!(f, "Coordinates: {}, {}", lat, lng)?;
        }
        writeln!(f, "Remoteness: {}", self.remoteness)?;
        write!(f, "Socio-economic level: {}", self.socio_economic_index)
    }
}

fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suburbs::SuburbTable;

    fn adelaide() -> SuburbRecord {
        SuburbTable::bundled()
            .unwrap()
            .find_exact("ADELAIDE")
            .cloned()
            .unwrap()
    }

    #[test]
    fn generated_full_address_format() {
        let record = AddressRecord::from_street_and_suburb(12, "North Terrace", &adelaide(), None);
        assert_eq!(record.full_address, "12 North Terrace, ADELAIDE SA 5000");
        assert_eq!(record.street_number, Some(12));
        assert!(record.latitude.is_none());
    }

    #[test]
    fn lookup_full_address_format() {
        let record = AddressRecord::from_suburb(&adelaide(), Some(Coordinates::new(-34.9285, 138.6007)));
        assert_eq!(record.full_address, "ADELAIDE, SA 5000, Australia");
        assert!(record.street_name.is_none());
        assert_eq!(record.latitude, Some(-34.9285));
    }

    #[test]
    fn coordinates_rounded_to_six_decimals() {
        let coords = Coordinates::new(-34.92851234567, 138.60071234567);
        let record = AddressRecord::from_suburb(&adelaide(), Some(coords));
        assert_eq!(record.latitude, Some(-34.928512));
        assert_eq!(record.longitude, Some(138.600712));
    }

    #[test]
    fn display_skips_absent_coordinates() {
        let record = AddressRecord::from_suburb(&adelaide(), None);
        let text = record.to_string();
        assert!(text.contains("Suburb: ADELAIDE"));
        assert!(!text.contains("Coordinates:"));
    }

    #[test]
    fn serializes_to_csv_row() {
        let record = AddressRecord::from_street_and_suburb(5, "King William Street", &adelaide(), None);
        let mut wtr = csv::Writer::from_writer(vec![]);
        wtr.serialize(&record).unwrap();
        let out = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
        assert!(out.contains("5 King William Street, ADELAIDE SA 5000"));
        assert!(out.contains("Major Cities of Australia"));
    }
}
