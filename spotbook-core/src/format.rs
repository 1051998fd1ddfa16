//! Display Helpers
//!
//! Geo distance and the small text utilities the place views use.

use std::sync::LazyLock;

use regex::Regex;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Place types too generic to label a place with
const GENERIC_TYPES: [&str; 4] = ["point_of_interest", "establishment", "geocode", "premise"];

const TYPE_LABELS: &[(&str, &str)] = &[
    ("restaurant", "Restaurant"),
    ("cafe", "Cafe"),
    ("bar", "Bar"),
    ("lodging", "Hotel"),
    ("park", "Park"),
    ("museum", "Museum"),
    ("shopping_mall", "Shopping Mall"),
    ("store", "Store"),
    ("gas_station", "Gas Station"),
    ("hospital", "Hospital"),
    ("school", "School"),
    ("church", "Church"),
    ("tourist_attraction", "Tourist Attraction"),
    ("amusement_park", "Amusement Park"),
    ("zoo", "Zoo"),
    ("aquarium", "Aquarium"),
    ("library", "Library"),
    ("gym", "Gym"),
    ("pharmacy", "Pharmacy"),
    ("bank", "Bank"),
    ("atm", "ATM"),
    ("subway_station", "Subway Station"),
    ("bus_station", "Bus Station"),
    ("airport", "Airport"),
    ("movie_theater", "Movie Theater"),
    ("night_club", "Night Club"),
    ("spa", "Spa"),
    ("beauty_salon", "Beauty Salon"),
];

static ADDRESS_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"^[0-9]+[-chōme]").unwrap(),
        Regex::new(r"^[0-9]+\s+[A-Z]").unwrap(),
        Regex::new(
            r"(?i)[0-9]+\s+\w+\s+(Street|St|Avenue|Ave|Road|Rd|Boulevard|Blvd|Drive|Dr|Lane|Ln|Way|Court|Ct|Place|Pl)",
        )
        .unwrap(),
    ]
});

/// Great-circle distance between two points, in kilometres
pub fn distance_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Human label for the first specific type in `types`
pub fn format_place_type<S: AsRef<str>>(types: &[S]) -> String {
    let Some(primary) = types
        .iter()
        .map(AsRef::as_ref)
        .find(|t| !GENERIC_TYPES.contains(t))
    else {
        return "Place".to_string();
    };

    if let Some((_, label)) = TYPE_LABELS.iter().find(|(key, _)| *key == primary) {
        return label.to_string();
    }
    primary
        .split('_')
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Whether a place name is really just a street address
pub fn is_address_pattern(name: &str) -> bool {
    ADDRESS_PATTERNS.iter().any(|re| re.is_match(name))
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
