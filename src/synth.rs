use std::f64::consts::TAU;

use rand::Rng;

use crate::suburbs::Coordinates;

/// street names common across South Australian suburbs
pub const STREET_NAMES: &[&str] = &[
    "Main Street",
    "High Street",
    "Church Street",
    "King Street",
    "Queen Street",
    "Victoria Street",
    "George Street",
    "Elizabeth Street",
    "North Terrace",
    "South Terrace",
    "East Terrace",
    "West Terrace",
    "Adelaide Street",
    "Franklin Street",
    "Flinders Street",
    "Hindley Street",
    "Rundle Street",
    "Pulteney Street",
    "Morphett Street",
    "Light Square",
    "Hurtle Square",
    "Wellington Square",
    "Whitmore Square",
    "Palmer Place",
    "Gawler Place",
    "Pirie Street",
    "Waymouth Street",
    "Currie Street",
    "Grenfell Street",
    "Angas Street",
    "Halifax Street",
    "Carrington Street",
    "Prospect Road",
    "Magill Road",
    "Portrush Road",
    "Glen Osmond Road",
    "Unley Road",
    "Goodwood Road",
    "Cross Road",
    "Marion Road",
    "Brighton Road",
    "Henley Beach Road",
    "Port Road",
    "Grand Junction Road",
    "Churchill Road",
    "Torrens Road",
    "Lower North East Road",
    "Upper Sturt Road",
    "Main North Road",
];

const STREET_NUMBER_MIN: u32 = 1;
const STREET_NUMBER_MAX: u32 = 999;

/// how far a synthetic address may land from its suburb centre
const SCATTER_RADIUS_KM: f64 = 1.0;
const KM_PER_DEGREE: f64 = 111.0;

/// a synthesized street number and name, not yet bound to a suburb
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreetAddress {
    pub number: u32,
    pub name: &'static str,
}

/// draw a street number and name; always consumes exactly two rng values
pub fn synthesize<R: Rng + ?Sized>(rng: &mut R) -> StreetAddress {
    let number = rng.random_range(STREET_NUMBER_MIN..=STREET_NUMBER_MAX);
    let name = STREET_NAMES[rng.random_range(0..STREET_NAMES.len())];
    StreetAddress { number, name }
}

/// a polar offset from a suburb centre, drawn before the centre is known so
/// the rng stream stays independent of coordinate availability
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScatterOffset {
    angle: f64,
    distance_deg: f64,
}

/// draw a scatter offset; always consumes exactly two rng values
pub fn scatter_offset<R: Rng + ?Sized>(rng: &mut R) -> ScatterOffset {
    let angle = rng.random_range(0.0..TAU);
    let distance_deg = rng.random_range(0.0..SCATTER_RADIUS_KM / KM_PER_DEGREE);
    ScatterOffset { angle, distance_deg }
}

impl ScatterOffset {
    /// displace the suburb centre, correcting longitude for latitude
    pub fn apply(&self, centre: Coordinates) -> Coordinates {
        let latitude = centre.latitude + self.distance_deg * self.angle.cos();
        let longitude = centre.longitude
            + self.distance_deg * self.angle.sin() / centre.latitude.to_radians().cos();
        Coordinates::new(latitude, longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn street_numbers_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..500 {
            let street = synthesize(&mut rng);
            assert!((STREET_NUMBER_MIN..=STREET_NUMBER_MAX).contains(&street.number));
            assert!(STREET_NAMES.contains(&street.name));
        }
    }

    #[test]
    fn same_seed_synthesizes_the_same_street() {
        let mut rng_a = StdRng::seed_from_u64(9);
        let mut rng_b = StdRng::seed_from_u64(9);
        for _ in 0..20 {
            assert_eq!(synthesize(&mut rng_a), synthesize(&mut rng_b));
        }
    }

    #[test]
    fn scatter_stays_within_the_radius() {
        let mut rng = StdRng::seed_from_u64(2);
        let centre = Coordinates::new(-34.9285, 138.6007);
        for _ in 0..500 {
            let scattered = scatter_offset(&mut rng).apply(centre);
            // longitude correction stretches the displacement slightly, so
            // allow some slack over the nominal radius
            assert!(centre.distance_km(&scattered) < 1.5);
        }
    }

    #[test]
    fn scatter_moves_the_point() {
        let mut rng = StdRng::seed_from_u64(3);
        let centre = Coordinates::new(-34.9285, 138.6007);
        let scattered = scatter_offset(&mut rng).apply(centre);
        assert_ne!(centre, scattered);
    }
}
