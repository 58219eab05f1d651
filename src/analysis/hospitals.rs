//! Hospital lookup.
//!
//! The model is asked for real facilities near a place. When it cannot
//! answer, the fallback list is built from the city name so the page still
//! shows the district hospital and the national emergency number.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::{Analyzed, Gateway};
use crate::fallback;
use crate::model::lenient;

const NEARBY_PROMPT: &str = r#"You are a medical facility locator AI. Based on the location, return ONLY valid JSON with 10 real hospitals:
{
  "hospitals": [
    {
      "name": "Exact Hospital Name",
      "address": "Complete Address with Pincode",
      "phone": "+91-XXXXXXXXXX",
      "specialties": ["Cardiology", "Emergency"],
      "distance": "X.X km",
      "rating": 4.2,
      "type": "Government|Private|Multi-specialty"
    }
  ]
}"#;

const LOOKUP_PROMPT: &str = r#"Search for exact hospital and return ONLY valid JSON:
{
  "found": true,
  "hospital": {
    "name": "Exact Hospital Name",
    "address": "Complete Address",
    "phone": "+91-XXXXXXXXXX",
    "specialties": ["Services"],
    "distance": "X km",
    "rating": 4.5,
    "type": "Government|Private"
  }
}"#;

const LOCATE_PROMPT: &str = r#"You are a location identifier AI. Given GPS coordinates, return ONLY valid JSON:
{
  "location": "City, State, Country"
}

Provide the most accurate city and state name for the coordinates."#;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hospital {
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub address: String,
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub phone: String,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub specialties: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub distance: String,
    #[serde(default, deserialize_with = "lenient::number", skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(rename = "type", default, deserialize_with = "lenient::string_or_empty")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HospitalList {
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub hospitals: Vec<Hospital>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HospitalLookup {
    #[serde(default)]
    pub found: bool,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub hospital: Option<Hospital>,
}

#[derive(Debug, Deserialize)]
struct LocationAnswer {
    #[serde(default, deserialize_with = "lenient::string")]
    location: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct HospitalFinder {
    gateway: Gateway,
}

impl HospitalFinder {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    #[instrument(skip_all)]
    pub async fn find_nearby(&self, location: &str) -> Analyzed<HospitalList> {
        let prompt = format!(
            "Find 10 real hospitals near {location}. Include major government hospitals, \
             private hospitals, and medical colleges with accurate addresses and phone numbers."
        );
        let answer = self
            .gateway
            .ask_json::<HospitalList>("hospitals", NEARBY_PROMPT, &prompt)
            .await
            .map(|mut list| {
                list.hospitals.retain(|h| !h.name.is_empty());
                list
            })
            .filter(|list| !list.hospitals.is_empty());

        let outcome = Analyzed::or_fallback(answer, || fallback::nearby_hospitals(location));
        info!(source = ?outcome.source, count = outcome.result.hospitals.len(), "Hospitals listed");
        outcome
    }

    #[instrument(skip_all)]
    pub async fn find_specific(&self, hospital_name: &str, location: &str) -> Analyzed<HospitalLookup> {
        let prompt = format!(
            "Find hospital \"{hospital_name}\" in {location}. \
             Provide real address and contact details if it exists."
        );
        let answer = self
            .gateway
            .ask_json::<HospitalLookup>("hospital_lookup", LOOKUP_PROMPT, &prompt)
            .await
            .filter(|lookup| lookup.found && lookup.hospital.is_some());

        Analyzed::or_fallback(answer, || fallback::hospital_lookup(hospital_name, location))
    }

    /// Reverse-geocode coordinates into "City, State, Country".
    ///
    /// Falls back to the coordinates themselves.
    #[instrument(skip_all)]
    pub async fn identify_location(&self, latitude: f64, longitude: f64) -> Analyzed<String> {
        let prompt = format!(
            "Identify the location for coordinates: {latitude}, {longitude}. \
             Return the city, state, and country name."
        );
        let answer = self
            .gateway
            .ask_json::<LocationAnswer>("locate", LOCATE_PROMPT, &prompt)
            .await
            .and_then(|answer| answer.location);

        Analyzed::or_fallback(answer, || format!("{latitude}, {longitude}"))
    }
}
