//! Best-effort vehicle category inference from free-text make/model.
//!
//! Older registrations were stored with category `Other` even when the
//! make/model make the category obvious. Read paths use this to present a
//! better guess; stored records are never rewritten.

use crate::types::VehicleType;

const MOTORCYCLE_KEYWORDS: &[&str] = &[
    "motorcycle",
    "motorbike",
    "bike",
    "scooter",
    "yamaha",
    "kawasaki",
    "harley",
    "ducati",
    "road prince",
    "unique",
    "super power",
    "ravi",
    "hi speed",
    "super star",
    "cd 70",
    "cd70",
    "us 70",
    "us70",
    "cg 125",
    "cg125",
    "cb 150",
    "cb150",
    "ybr",
    "ybz",
    "gs 150",
    "gs150",
    "gd 110",
    "pridor",
    "dream",
];

const CAR_KEYWORDS: &[&str] = &[
    "car",
    "toyota",
    "suzuki",
    "honda",
    "hyundai",
    "kia",
    "nissan",
    "mitsubishi",
    "daihatsu",
    "mercedes",
    "bmw",
    "audi",
    "changan",
    "proton",
    "haval",
    "mg",
    "faw",
    "corolla",
    "civic",
    "city",
    "yaris",
    "vitz",
    "prado",
    "fortuner",
    "alto",
    "mehran",
    "cultus",
    "swift",
    "wagon r",
    "bolan",
    "sportage",
    "picanto",
    "elantra",
    "tucson",
    "sonata",
    "accord",
    "bravo",
];

/// Returns `current` unless it is [`VehicleType::Other`], in which case the
/// make/model text is matched against known motorcycle fragments first and
/// car fragments second.
pub fn classify_vehicle_type(current: VehicleType, make: &str, model: &str) -> VehicleType {
    if current != VehicleType::Other {
        return current;
    }

    let haystack = normalize(&format!("{make} {model}"));
    if matches_any(&haystack, MOTORCYCLE_KEYWORDS) {
        VehicleType::Motorcycle
    } else if matches_any(&haystack, CAR_KEYWORDS) {
        VehicleType::Car
    } else {
        VehicleType::Other
    }
}

/// Lowercase, punctuation to spaces, single-spaced, padded with one space on
/// each side so keywords only match on word boundaries.
fn normalize(text: &str) -> String {
    let lowered: String = text
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { ' ' })
        .collect();
    let words: Vec<&str> = lowered.split_whitespace().collect();
    format!(" {} ", words.join(" "))
}

fn matches_any(haystack: &str, keywords: &[&str]) -> bool {
    keywords
        .iter()
        .any(|kw| haystack.contains(&format!(" {kw} ")))
}
