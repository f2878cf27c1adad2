use crate::error::AppError;

/// Rayon terrestre utilisé pour convertir une distance en radians
const EARTH_RADIUS_MI: f64 = 3963.2;
const EARTH_RADIUS_KM: f64 = 6378.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Miles,
    Kilometers,
}

impl Unit {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match raw {
            "mi" => Ok(Unit::Miles),
            "km" => Ok(Unit::Kilometers),
            other => Err(AppError::BadRequest(format!(
                "Invalid unit '{other}'. Please use 'mi' or 'km'."
            ))),
        }
    }

    pub fn earth_radius(self) -> f64 {
        match self {
            Unit::Miles => EARTH_RADIUS_MI,
            Unit::Kilometers => EARTH_RADIUS_KM,
        }
    }
}

/// Parse "lat,lng"
pub fn parse_lat_lng(raw: &str) -> Result<(f64, f64), AppError> {
    let invalid = || {
        AppError::BadRequest("Please provide latitude and longitude in the format lat,lng.".to_string())
    };

    let (lat, lng) = raw.split_once(',').ok_or_else(invalid)?;
    let lat: f64 = lat.trim().parse().map_err(|_| invalid())?;
    let lng: f64 = lng.trim().parse().map_err(|_| invalid())?;

    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(invalid());
    }
    Ok((lat, lng))
}

/// Angle central (radians) entre deux points, formule de haversine
pub fn central_angle(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lng1) = (from.0.to_radians(), from.1.to_radians());
    let (lat2, lng2) = (to.0.to_radians(), to.1.to_radians());

    let a = ((lat2 - lat1) / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * ((lng2 - lng1) / 2.0).sin().powi(2);
    2.0 * a.sqrt().min(1.0).asin()
}

pub fn distance(from: (f64, f64), to: (f64, f64), unit: Unit) -> f64 {
    central_angle(from, to) * unit.earth_radius()
}
