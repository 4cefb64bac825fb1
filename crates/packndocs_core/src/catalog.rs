//! Static destination and document-requirement tables.

use serde::Serialize;

use crate::models::{TargetRegion, VisaType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Country {
    pub id: &'static str,
    pub name: &'static str,
    pub region: TargetRegion,
    pub visa_type: VisaType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRequirement {
    pub id: &'static str,
    pub name: &'static str,
    pub required: bool,
}

const fn schengen(id: &'static str, name: &'static str) -> Country {
    Country {
        id,
        name,
        region: TargetRegion::Eu,
        visa_type: VisaType::Schengen,
    }
}

const fn required(id: &'static str, name: &'static str) -> DocumentRequirement {
    DocumentRequirement {
        id,
        name,
        required: true,
    }
}

const fn optional(id: &'static str, name: &'static str) -> DocumentRequirement {
    DocumentRequirement {
        id,
        name,
        required: false,
    }
}

pub const COUNTRIES: &[Country] = &[
    schengen("germany", "Germany"),
    schengen("france", "France"),
    schengen("spain", "Spain"),
    schengen("italy", "Italy"),
    schengen("netherlands", "Netherlands"),
    schengen("belgium", "Belgium"),
    schengen("austria", "Austria"),
    schengen("greece", "Greece"),
    schengen("portugal", "Portugal"),
    schengen("sweden", "Sweden"),
    schengen("norway", "Norway"),
    schengen("denmark", "Denmark"),
    schengen("finland", "Finland"),
    schengen("poland", "Poland"),
    schengen("czech", "Czech Republic"),
    schengen("hungary", "Hungary"),
    schengen("switzerland", "Switzerland"),
    schengen("luxembourg", "Luxembourg"),
    schengen("malta", "Malta"),
    schengen("slovenia", "Slovenia"),
    schengen("slovakia", "Slovakia"),
    schengen("estonia", "Estonia"),
    schengen("latvia", "Latvia"),
    schengen("lithuania", "Lithuania"),
    schengen("croatia", "Croatia"),
    schengen("bulgaria", "Bulgaria"),
    schengen("romania", "Romania"),
    schengen("iceland", "Iceland"),
    Country {
        id: "usa",
        name: "United States",
        region: TargetRegion::Us,
        visa_type: VisaType::UsVisa,
    },
    Country {
        id: "uk",
        name: "United Kingdom",
        region: TargetRegion::Gb,
        visa_type: VisaType::UkVisa,
    },
];

pub const SCHENGEN_DOCUMENTS: &[DocumentRequirement] = &[
    required("passport", "Passport"),
    required("photo", "Biometric Photo"),
    required("application_form", "Visa Application Form"),
    required("insurance", "Travel Health Insurance"),
    required("flight_reservation", "Flight Reservation"),
    required("hotel_reservation", "Accommodation Reservation"),
    required("bank_statement", "Bank Statement"),
    required("employment_letter", "Employment Certificate"),
    optional("travel_itinerary", "Travel Itinerary"),
    optional("old_passports", "Previous Passports"),
];

pub const US_DOCUMENTS: &[DocumentRequirement] = &[
    required("passport", "Passport"),
    required("photo", "Digital Photo"),
    required("ds160", "DS-160 Form"),
    required("appointment_confirmation", "Interview Appointment"),
    required("bank_statement", "Bank Statements"),
    required("employment_letter", "Employment Letter"),
    optional("tax_returns", "Tax Returns"),
    optional("property_documents", "Property Documents"),
    optional("invitation_letter", "Invitation Letter"),
    optional("travel_itinerary", "Travel Plans"),
];

pub const UK_DOCUMENTS: &[DocumentRequirement] = &[
    required("passport", "Passport"),
    required("photo", "Passport Photo"),
    required("online_application", "Online Application"),
    required("appointment_confirmation", "Biometric Appointment"),
    required("bank_statement", "Financial Evidence"),
    required("employment_letter", "Employment Evidence"),
    required("accommodation", "Accommodation Details"),
    optional("travel_history", "Travel History"),
    optional("invitation_letter", "Invitation Letter"),
    optional("tb_test", "TB Test Certificate"),
];

// EU (non-Schengen) visas reuse the Schengen base set.
const EU_VISA_DOCUMENT_COUNT: usize = 8;

pub fn country(id: &str) -> Option<&'static Country> {
    COUNTRIES.iter().find(|country| country.id == id)
}

pub fn countries_in(region: TargetRegion) -> Vec<&'static Country> {
    COUNTRIES
        .iter()
        .filter(|country| country.region == region)
        .collect()
}

pub fn country_in_region(country_id: &str, region: TargetRegion) -> bool {
    country(country_id).is_some_and(|country| country.region == region)
}

pub fn documents_for(visa_type: VisaType) -> &'static [DocumentRequirement] {
    match visa_type {
        VisaType::Schengen => SCHENGEN_DOCUMENTS,
        VisaType::UsVisa => US_DOCUMENTS,
        VisaType::UkVisa => UK_DOCUMENTS,
        VisaType::EuVisa => &SCHENGEN_DOCUMENTS[..EU_VISA_DOCUMENT_COUNT],
    }
}

/// Requirements for a country's visa type; unknown countries have none.
pub fn documents_for_country(country_id: &str) -> &'static [DocumentRequirement] {
    country(country_id)
        .map(|country| documents_for(country.visa_type))
        .unwrap_or(&[])
}

pub fn document(visa_type: VisaType, document_id: &str) -> Option<&'static DocumentRequirement> {
    documents_for(visa_type)
        .iter()
        .find(|document| document.id == document_id)
}

pub fn required_documents(visa_type: VisaType) -> Vec<&'static DocumentRequirement> {
    documents_for(visa_type)
        .iter()
        .filter(|document| document.required)
        .collect()
}

pub fn optional_documents(visa_type: VisaType) -> Vec<&'static DocumentRequirement> {
    documents_for(visa_type)
        .iter()
        .filter(|document| !document.required)
        .collect()
}
