//! Deterministic advice used when the completion service is unavailable.
//!
//! The chat and diagnosis advisors scan the input case-insensitively against
//! an ordered table of keyword groups; the first group with any hit wins.
//! The remaining functions return fixed placeholder results. None of them can
//! fail and none ever returns an empty answer.

use std::collections::BTreeMap;

use crate::analysis::documents::DocumentAnalysis;
use crate::analysis::hospitals::{Hospital, HospitalList, HospitalLookup};
use crate::analysis::outlook::{
    HealthOutlook, HealthTrajectory, OverallTrend, RiskEntry, TrendAnalysis, TrendPredictions,
    TrendReport,
};
use crate::model::{DiagnosisResult, Urgency};

/// One keyword group and the chat reply it selects.
struct ChatRule {
    keywords: &'static [&'static str],
    reply: &'static str,
}

const CHAT_RULES: &[ChatRule] = &[
    ChatRule {
        keywords: &["fever", "temperature"],
        reply: "For fever: Rest, drink plenty of fluids, and monitor your temperature. \
                Seek medical attention if fever exceeds 102°F (39°C) or persists for more than 3 days.",
    },
    ChatRule {
        keywords: &["cut", "wound", "bleeding"],
        reply: "For cuts: 1) Clean your hands, 2) Stop bleeding with direct pressure, \
                3) Clean the wound gently, 4) Apply antibiotic ointment, 5) Cover with a bandage. \
                Seek medical help for deep cuts.",
    },
    ChatRule {
        keywords: &["burn"],
        reply: "For minor burns: 1) Cool with cold water for 10-20 minutes, \
                2) Remove jewelry/tight items, 3) Apply aloe vera or moisturizer, \
                4) Cover loosely with gauze. Seek immediate help for severe burns.",
    },
    ChatRule {
        keywords: &["emergency", "urgent"],
        reply: "For medical emergencies, call your local emergency number immediately. \
                Signs of emergency: difficulty breathing, chest pain, severe bleeding, \
                loss of consciousness, or severe allergic reactions.",
    },
];

const CHAT_DEFAULT: &str = "I'm here to help with basic health questions and first-aid guidance. \
    For specific medical concerns, please consult with a healthcare professional. \
    What would you like to know about?";

/// One keyword group and the diagnosis it selects.
struct DiagnosisRule {
    keywords: &'static [&'static str],
    diseases: &'static [&'static str],
    urgency: Urgency,
    advice: &'static str,
}

const DIAGNOSIS_RULES: &[DiagnosisRule] = &[
    DiagnosisRule {
        keywords: &["fever", "temperature"],
        diseases: &["Common Cold", "Viral Infection", "Flu"],
        urgency: Urgency::Medium,
        advice: "Rest, stay hydrated, monitor temperature. \
                 Consult a doctor if fever persists over 3 days or exceeds 102°F.",
    },
    DiagnosisRule {
        keywords: &["headache", "head pain"],
        diseases: &["Tension Headache", "Migraine", "Dehydration"],
        urgency: Urgency::Low,
        advice: "Rest in a quiet, dark room. Stay hydrated. \
                 Consider over-the-counter pain relief if needed.",
    },
    DiagnosisRule {
        keywords: &["cough", "throat"],
        diseases: &["Upper Respiratory Infection", "Common Cold", "Throat Irritation"],
        urgency: Urgency::Low,
        advice: "Stay hydrated, use throat lozenges, rest your voice. \
                 See a doctor if symptoms worsen or persist.",
    },
];

const DIAGNOSIS_DEFAULT_DISEASES: &[&str] = &["Symptoms require professional evaluation"];

const DIAGNOSIS_DEFAULT_ADVICE: &str = "Please consult with a qualified healthcare professional \
    for proper diagnosis and treatment.";

fn mentions_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

/// Canned first-aid reply for a chat message.
pub fn chat_reply(message: &str) -> &'static str {
    let text = message.to_lowercase();
    CHAT_RULES
        .iter()
        .find(|rule| mentions_any(&text, rule.keywords))
        .map(|rule| rule.reply)
        .unwrap_or(CHAT_DEFAULT)
}

/// Canned diagnosis for a symptom description.
pub fn diagnosis(symptoms: &str) -> DiagnosisResult {
    let text = symptoms.to_lowercase();
    let (diseases, urgency, advice) = DIAGNOSIS_RULES
        .iter()
        .find(|rule| mentions_any(&text, rule.keywords))
        .map(|rule| (rule.diseases, rule.urgency, rule.advice))
        .unwrap_or((DIAGNOSIS_DEFAULT_DISEASES, Urgency::Medium, DIAGNOSIS_DEFAULT_ADVICE));

    DiagnosisResult {
        urgency,
        diseases: diseases.iter().map(|d| d.to_string()).collect(),
        advice: advice.to_string(),
        ..Default::default()
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn document_analysis() -> DocumentAnalysis {
    DocumentAnalysis {
        summary: "Report analysis completed".to_string(),
        key_findings: strings(&["Unable to parse specific findings"]),
        recommendations: strings(&["Consult with healthcare provider for detailed interpretation"]),
        ..Default::default()
    }
}

/// City name for the fallback hospital list: the letters-and-spaces run
/// that ends at the first comma or at the end of the text.
fn city_name(location: &str) -> &str {
    location
        .split(',')
        .find_map(|segment| {
            let start = segment
                .char_indices()
                .rev()
                .find(|(_, c)| !(c.is_ascii_alphabetic() || c.is_whitespace()))
                .map(|(i, c)| i + c.len_utf8())
                .unwrap_or(0);
            let name = segment[start..].trim();
            (!name.is_empty()).then_some(name)
        })
        .unwrap_or("City")
}

pub fn nearby_hospitals(location: &str) -> HospitalList {
    let city = city_name(location);
    HospitalList {
        hospitals: vec![
            Hospital {
                name: format!("{city} District Hospital"),
                address: format!("District Hospital Road, {city}"),
                phone: "+91-108".to_string(),
                specialties: strings(&["Emergency", "General Medicine"]),
                distance: "2.5 km".to_string(),
                rating: Some(4.0),
                kind: "Government".to_string(),
            },
            Hospital {
                name: format!("Apollo Hospital {city}"),
                address: format!("Main Road, {city}"),
                phone: "+91-XXXX-XXXXXX".to_string(),
                specialties: strings(&["Cardiology", "Emergency"]),
                distance: "3.8 km".to_string(),
                rating: Some(4.5),
                kind: "Private".to_string(),
            },
            Hospital {
                name: "Emergency Services (108)".to_string(),
                address: "Available throughout the city".to_string(),
                phone: "108".to_string(),
                specialties: strings(&["Emergency"]),
                distance: "On-call".to_string(),
                rating: Some(5.0),
                kind: "Emergency".to_string(),
            },
        ],
    }
}

/// Only one chain is known offline.
pub fn hospital_lookup(hospital_name: &str, location: &str) -> HospitalLookup {
    if !hospital_name.to_lowercase().contains("apollo") {
        return HospitalLookup::default();
    }

    HospitalLookup {
        found: true,
        hospital: Some(Hospital {
            name: "Apollo Hospital".to_string(),
            address: format!("Apollo Campus, {location}"),
            phone: "+91-XXXX-XXXXXX".to_string(),
            specialties: strings(&["Multi-specialty", "Emergency"]),
            distance: "5-10 km".to_string(),
            rating: Some(4.5),
            kind: "Private".to_string(),
        }),
    }
}

pub fn health_outlook() -> HealthOutlook {
    let general = RiskEntry {
        risk: "medium".to_string(),
        factors: strings(&["Insufficient data"]),
        timeline: "Unknown".to_string(),
    };

    HealthOutlook {
        risk_assessment: BTreeMap::from([("general".to_string(), general)]),
        health_trajectory: HealthTrajectory {
            short_term: "Monitor symptoms".to_string(),
            medium_term: "Regular checkups".to_string(),
            long_term: "Maintain healthy lifestyle".to_string(),
        },
        ..Default::default()
    }
}

pub fn trend_report() -> TrendReport {
    TrendReport {
        trend_analysis: TrendAnalysis {
            overall: Some(OverallTrend {
                health: "fair".to_string(),
            }),
            ..Default::default()
        },
        predictions: TrendPredictions {
            next_week: "Continue monitoring".to_string(),
            next_month: "Regular follow-up recommended".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_keyword_groups() {
        assert!(chat_reply("I have a FEVER").starts_with("For fever"));
        assert!(chat_reply("my temperature is high").starts_with("For fever"));
        assert!(chat_reply("deep wound on arm").starts_with("For cuts"));
        assert!(chat_reply("I burned my hand").starts_with("For minor burns"));
        assert!(chat_reply("this is urgent").starts_with("For medical emergencies"));
    }

    #[test]
    fn test_chat_first_group_wins() {
        // Mentions both a burn and a fever; fever is checked first.
        assert!(chat_reply("burn and fever").starts_with("For fever"));
    }

    #[test]
    fn test_chat_is_total() {
        for input in ["", "   ", "hello", "¿qué tal?", "\u{0}"] {
            let reply = chat_reply(input);
            assert!(!reply.is_empty());
        }
        assert_eq!(chat_reply("hello"), CHAT_DEFAULT);
    }

    #[test]
    fn test_diagnosis_keyword_groups() {
        let fever = diagnosis("Fever since yesterday");
        assert_eq!(fever.urgency, Urgency::Medium);
        assert_eq!(fever.diseases[0], "Common Cold");

        let headache = diagnosis("bad head pain");
        assert_eq!(headache.urgency, Urgency::Low);
        assert!(headache.diseases.contains(&"Migraine".to_string()));

        let cough = diagnosis("sore throat");
        assert_eq!(cough.diseases[0], "Upper Respiratory Infection");
    }

    #[test]
    fn test_diagnosis_default() {
        let result = diagnosis("");
        assert_eq!(result.urgency, Urgency::Medium);
        assert_eq!(result.diseases, vec![DIAGNOSIS_DEFAULT_DISEASES[0].to_string()]);
        assert!(!result.is_blank());
    }

    #[test]
    fn test_city_name() {
        assert_eq!(city_name("Pune, Maharashtra"), "Pune");
        assert_eq!(city_name("Navi Mumbai"), "Navi Mumbai");
        assert_eq!(city_name("Sector 5, Noida"), "Noida");
        assert_eq!(city_name("12.97, 77.59"), "City");
        assert_eq!(city_name(""), "City");
    }

    #[test]
    fn test_nearby_hospitals() {
        let list = nearby_hospitals("Jaipur, Rajasthan");
        assert_eq!(list.hospitals.len(), 3);
        assert_eq!(list.hospitals[0].name, "Jaipur District Hospital");
        assert_eq!(list.hospitals[1].name, "Apollo Hospital Jaipur");
        assert_eq!(list.hospitals[2].phone, "108");
    }

    #[test]
    fn test_hospital_lookup() {
        let apollo = hospital_lookup("APOLLO Spectra", "Delhi");
        assert!(apollo.found);
        assert_eq!(
            apollo.hospital.map(|h| h.address),
            Some("Apollo Campus, Delhi".to_string())
        );

        let unknown = hospital_lookup("St. Mary's", "Delhi");
        assert!(!unknown.found);
        assert!(unknown.hospital.is_none());
    }
}
